//! Process-wide table of live sessions.
//!
//! Keyed by remote address. Inserts are insert-if-absent and removal is
//! idempotent, so the accept loop, a failing connection task and the
//! shutdown fan-out can all race on the same address safely. Only the
//! caller whose `remove` actually takes the entry runs teardown.

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::network::session::ClientSession;
use crate::service::scheduler::{Scheduler, WorldTask};

/// Logins that have sent login start but not yet reached `PLAY`.
#[derive(Debug, Default)]
pub struct PendingLogins {
    pending: DashMap<SocketAddr, String>,
}

impl PendingLogins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, address: SocketAddr, username: &str) {
        self.pending.insert(address, username.to_string());
    }

    /// Forget `address`. Returns the username it was logging in as, if any.
    pub fn finish(&self, address: SocketAddr) -> Option<String> {
        self.pending.remove(&address).map(|(_, name)| name)
    }

    pub fn is_pending(&self, address: SocketAddr) -> bool {
        self.pending.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

pub struct ConnectionRegistry {
    sessions: DashMap<SocketAddr, Arc<ClientSession>>,
    pending: Arc<PendingLogins>,
    scheduler: Arc<dyn Scheduler>,
}

impl ConnectionRegistry {
    pub fn new(pending: Arc<PendingLogins>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            sessions: DashMap::new(),
            pending,
            scheduler,
        }
    }

    /// Session for `address`, created if absent. Concurrent callers for the
    /// same address get the same `Arc`.
    pub fn register(&self, address: SocketAddr) -> Arc<ClientSession> {
        self.sessions
            .entry(address)
            .or_insert_with(|| {
                debug!(addr = %address, "Registering session");
                Arc::new(ClientSession::new(address))
            })
            .clone()
    }

    pub fn lookup(&self, address: SocketAddr) -> Option<Arc<ClientSession>> {
        self.sessions.get(&address).map(|entry| entry.value().clone())
    }

    /// Tear down the session for `address`.
    ///
    /// Always clears any pending-login entry for the address. If a session
    /// was present it is closed and its linked player, if any, is detached
    /// and reported to the scheduler. Returns `false` when there was nothing
    /// to remove.
    pub fn remove(&self, address: SocketAddr) -> bool {
        let removed = self.sessions.remove(&address);
        if let Some(name) = self.pending.finish(address) {
            debug!(addr = %address, username = %name, "Dropped pending login");
        }

        let Some((_, session)) = removed else {
            return false;
        };
        session.close();
        if let Some(profile) = session.detach_player() {
            info!(addr = %address, player = %profile.name, "Player disconnected");
            if let Err(e) = self.scheduler.submit(WorldTask::PlayerLeft { profile }) {
                warn!(addr = %address, error = %e, "Failed to queue player departure");
            }
        }
        debug!(addr = %address, "Session removed");
        true
    }

    /// Send every live session a disconnect notice, then remove it.
    pub fn shutdown(&self, reason: &str) -> usize {
        let addresses: Vec<SocketAddr> = self.sessions.iter().map(|e| *e.key()).collect();
        info!(sessions = addresses.len(), "Disconnecting all sessions");

        for address in &addresses {
            if let Some(session) = self.lookup(*address) {
                session.disconnect(reason);
            }
        }
        addresses
            .into_iter()
            .filter(|address| self.remove(*address))
            .count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions with an authenticated player attached.
    pub fn online_players(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().has_player())
            .count()
    }

    pub fn pending_logins(&self) -> &Arc<PendingLogins> {
        &self.pending
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("sessions", &self.sessions.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}
