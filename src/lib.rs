//! # Gateway Protocol
//!
//! The network front door of a block-game server speaking protocol 47
//! (client 1.8.x). It accepts TCP connections, reassembles length-prefixed
//! frames, walks each client through handshake, status and login, switches
//! the stream to AES-128-CFB8 and optional zlib compression, verifies the
//! player with a session authority, and hands in-game input to the
//! simulation through a scheduler.
//!
//! ## Layers
//! - [`core`]: varints, frames, the Tokio codec
//! - [`protocol`]: typed packets, the packet registry, dispatch, login coordinator
//! - [`network`]: per-connection session, connection registry, TCP server
//! - [`service`]: identity verification, scheduler and world interfaces
//! - [`utils`]: crypto, compression, logging, metrics, timeouts
//!
//! ## Quick Start
//! ```rust,no_run
//! use std::sync::Arc;
//! use gateway_protocol::config::NetworkConfig;
//! use gateway_protocol::network::{start_server, ConnectionRegistry, PendingLogins};
//! use gateway_protocol::protocol::dispatcher::ServerContext;
//! use gateway_protocol::service::{ChannelScheduler, HttpSessionVerifier};
//!
//! # async fn run() -> gateway_protocol::error::Result<()> {
//! let config = NetworkConfig::from_env()?;
//! gateway_protocol::utils::logging::init_logging(&config.logging)?;
//!
//! let (scheduler, _queue) = ChannelScheduler::new();
//! let registry = Arc::new(ConnectionRegistry::new(
//!     Arc::new(PendingLogins::new()),
//!     Arc::new(scheduler),
//! ));
//! let verifier = Arc::new(HttpSessionVerifier::new(&config.auth)?);
//! let ctx = Arc::new(ServerContext::new(config, registry, verifier));
//! start_server(ctx).await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod protocol;
pub mod service;
pub mod utils;

pub use core::codec::FrameCodec;
pub use core::packet::RawPacket;
pub use error::{ProtocolError, Result};
pub use protocol::{Stage, PROTOCOL_VERSION};
