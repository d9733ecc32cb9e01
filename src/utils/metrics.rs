//! Observability and Metrics
//!
//! Atomic counters for one running gateway. A single [`Metrics`] instance is
//! shared by reference between the accept loop and every connection task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Counters for connection, login and packet activity
#[derive(Debug)]
pub struct Metrics {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Currently registered connections
    pub connections_active: AtomicU64,
    /// Login sequences started (login-start received)
    pub logins_started: AtomicU64,
    /// Logins that reached `PLAY`
    pub logins_succeeded: AtomicU64,
    /// Logins that ended in an error
    pub logins_failed: AtomicU64,
    /// Packets decoded from clients
    pub packets_in: AtomicU64,
    /// Packets written to clients
    pub packets_out: AtomicU64,
    /// Payload bytes received
    pub bytes_in: AtomicU64,
    /// Payload bytes sent
    pub bytes_out: AtomicU64,
    /// Outbound frames that went through zlib
    pub compressed_frames: AtomicU64,
    /// Status pings answered
    pub status_pings: AtomicU64,
    /// Connections closed by a protocol error
    pub protocol_errors: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            logins_started: AtomicU64::new(0),
            logins_succeeded: AtomicU64::new(0),
            logins_failed: AtomicU64::new(0),
            packets_in: AtomicU64::new(0),
            packets_out: AtomicU64::new(0),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            compressed_frames: AtomicU64::new(0),
            status_pings: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        // Saturate instead of wrapping if close is ever reported twice
        let _ = self
            .connections_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn login_started(&self) {
        self.logins_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_succeeded(&self) {
        self.logins_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_failed(&self) {
        self.logins_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one inbound packet of `byte_count` payload bytes
    pub fn packet_received(&self, byte_count: u64) {
        self.packets_in.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record one outbound packet of `byte_count` payload bytes
    pub fn packet_sent(&self, byte_count: u64) {
        self.packets_out.fetch_add(1, Ordering::Relaxed);
        self.bytes_out.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn frame_compressed(&self) {
        self.compressed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn status_ping(&self) {
        self.status_pings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            logins_started: self.logins_started.load(Ordering::Relaxed),
            logins_succeeded: self.logins_succeeded.load(Ordering::Relaxed),
            logins_failed: self.logins_failed.load(Ordering::Relaxed),
            packets_in: self.packets_in.load(Ordering::Relaxed),
            packets_out: self.packets_out.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            compressed_frames: self.compressed_frames.load(Ordering::Relaxed),
            status_pings: self.status_pings.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    pub fn log_metrics(&self) {
        let s = self.snapshot();
        info!(
            connections_total = s.connections_total,
            connections_active = s.connections_active,
            logins_started = s.logins_started,
            logins_succeeded = s.logins_succeeded,
            logins_failed = s.logins_failed,
            packets_in = s.packets_in,
            packets_out = s.packets_out,
            bytes_in = s.bytes_in,
            bytes_out = s.bytes_out,
            compressed_frames = s.compressed_frames,
            status_pings = s.status_pings,
            protocol_errors = s.protocol_errors,
            uptime_seconds = s.uptime_seconds,
            "Gateway metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub logins_started: u64,
    pub logins_succeeded: u64,
    pub logins_failed: u64,
    pub packets_in: u64,
    pub packets_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub compressed_frames: u64,
    pub status_pings: u64,
    pub protocol_errors: u64,
    pub uptime_seconds: u64,
}
