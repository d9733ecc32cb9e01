//! Packet dispatch.
//!
//! `dispatch` is a closed match over [`ServerboundPacket`]; there is no
//! runtime handler table to register into. Handlers never touch the socket.
//! They queue [`Directive`]s on the [`HandlerContext`] and the connection
//! task applies them in order once the handler returns, which keeps every
//! byte of the outbound stream (and every cipher or compression toggle)
//! on the connection's own task.

use std::sync::Arc;

use crate::config::NetworkConfig;
use crate::core::packet::RawPacket;
use crate::error::Result;
use crate::network::registry::ConnectionRegistry;
use crate::network::session::ClientSession;
use crate::protocol::packets::{ClientboundPacket, DecodeLimits, ServerboundPacket};
use crate::protocol::registry::PacketRegistry;
use crate::protocol::{handshake, play};
use crate::service::auth::IdentityVerifier;
use crate::service::scheduler::Scheduler;
use crate::utils::metrics::Metrics;

/// Shared services every connection task can reach.
pub struct ServerContext {
    pub config: Arc<NetworkConfig>,
    pub packets: PacketRegistry,
    pub registry: Arc<ConnectionRegistry>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub scheduler: Arc<dyn Scheduler>,
    pub metrics: Arc<Metrics>,
}

impl ServerContext {
    pub fn new(
        config: NetworkConfig,
        registry: Arc<ConnectionRegistry>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let packets = PacketRegistry::with_limits(DecodeLimits {
            max_string_length: config.transport.max_string_length,
        });
        let scheduler = registry.scheduler().clone();
        Self {
            config: Arc::new(config),
            packets,
            registry,
            verifier,
            scheduler,
            metrics: Arc::new(Metrics::new()),
        }
    }
}

/// Side effects a handler asks the connection task to perform.
#[derive(Debug)]
pub enum Directive {
    /// Write an already-encoded packet.
    Send(RawPacket),
    /// Switch the codec to the session's shared secret.
    EnableEncryption,
    /// Switch the codec to the compressed frame layout.
    EnableCompression(usize),
    /// Flush and close the connection.
    Close,
}

pub struct HandlerContext<'a> {
    pub session: &'a Arc<ClientSession>,
    pub server: &'a ServerContext,
    outbox: Vec<Directive>,
}

impl<'a> HandlerContext<'a> {
    pub fn new(session: &'a Arc<ClientSession>, server: &'a ServerContext) -> Self {
        Self {
            session,
            server,
            outbox: Vec::new(),
        }
    }

    /// Encode `packet` for the session's current stage and queue it.
    pub fn send(&mut self, packet: &ClientboundPacket) -> Result<()> {
        let raw = self.server.packets.encode(self.session.stage(), packet)?;
        self.outbox.push(Directive::Send(raw));
        Ok(())
    }

    pub fn push(&mut self, directive: Directive) {
        self.outbox.push(directive);
    }

    pub fn take_directives(&mut self) -> Vec<Directive> {
        std::mem::take(&mut self.outbox)
    }
}

/// Run the handler for one decoded packet.
pub async fn dispatch(ctx: &mut HandlerContext<'_>, packet: ServerboundPacket) -> Result<()> {
    match packet {
        ServerboundPacket::Handshake {
            protocol_version,
            next_state,
            ..
        } => handshake::handle_handshake(ctx, protocol_version, next_state),
        ServerboundPacket::StatusRequest => handshake::handle_status_request(ctx),
        ServerboundPacket::StatusPing { payload } => handshake::handle_status_ping(ctx, payload),
        ServerboundPacket::LoginStart { username } => {
            handshake::handle_login_start(ctx, username).await
        }
        ServerboundPacket::EncryptionResponse {
            shared_secret,
            verify_token,
        } => handshake::handle_encryption_response(ctx, &shared_secret, &verify_token).await,
        ServerboundPacket::KeepAlive { id } => play::handle_keep_alive(ctx, id),
        input => play::handle_player_input(ctx, input),
    }
}
