//! # Network Layer
//!
//! Per-connection state, the table of live connections, and the TCP server
//! that ties them to the protocol layer.
//!
//! ## Components
//! - **Session**: [`session::ClientSession`], shared between the connection
//!   task and whoever else holds the registry
//! - **Registry**: [`registry::ConnectionRegistry`] with idempotent removal
//! - **Server**: accept loop and the per-connection I/O task

pub mod registry;
pub mod server;
pub mod session;

pub use registry::{ConnectionRegistry, PendingLogins};
pub use server::{serve, serve_connection, start_server};
pub use session::{ClientSession, SessionCommand};
