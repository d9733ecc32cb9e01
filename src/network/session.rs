//! Per-connection state.
//!
//! A [`ClientSession`] is written by its own connection task and read from
//! anywhere (shutdown fan-out, the registry, tests). Scalar fields are
//! atomics; the shared secret and the login challenge are `OnceLock`s so
//! that their set-once rule holds under races without a lock.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError, RwLock};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::packets::ClientboundPacket;
use crate::protocol::Stage;
use crate::service::auth::GameProfile;
use crate::utils::crypto::{LoginKeyPair, SharedSecret};

/// Key pair and verify token issued at login start.
#[derive(Debug)]
pub struct LoginChallenge {
    pub keys: LoginKeyPair,
    pub verify_token: [u8; crate::utils::crypto::VERIFY_TOKEN_LEN],
}

/// Requests delivered to a connection task from outside it.
#[derive(Debug)]
pub enum SessionCommand {
    /// Write a packet in the session's current stage.
    Send(ClientboundPacket),
    /// Send a stage-appropriate disconnect notice, then close.
    Disconnect(String),
}

const COMPRESSION_OFF: i32 = -1;

pub struct ClientSession {
    address: SocketAddr,
    stage: AtomicU8,
    protocol_version: AtomicI32,
    username: OnceLock<String>,
    challenge: OnceLock<LoginChallenge>,
    secret: OnceLock<SharedSecret>,
    encryption_enabled: AtomicBool,
    compression_threshold: AtomicI32,
    player: RwLock<Option<GameProfile>>,
    commands_tx: mpsc::UnboundedSender<SessionCommand>,
    commands_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionCommand>>>,
    last_keepalive: Mutex<Instant>,
    closed: CancellationToken,
}

impl ClientSession {
    pub fn new(address: SocketAddr) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        Self {
            address,
            stage: AtomicU8::new(Stage::Handshake as u8),
            protocol_version: AtomicI32::new(0),
            username: OnceLock::new(),
            challenge: OnceLock::new(),
            secret: OnceLock::new(),
            encryption_enabled: AtomicBool::new(false),
            compression_threshold: AtomicI32::new(COMPRESSION_OFF),
            player: RwLock::new(None),
            commands_tx,
            commands_rx: Mutex::new(Some(commands_rx)),
            last_keepalive: Mutex::new(Instant::now()),
            closed: CancellationToken::new(),
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn stage(&self) -> Stage {
        Stage::from_u8(self.stage.load(Ordering::Acquire))
    }

    /// Move forward to `next`.
    ///
    /// # Errors
    /// `HandshakeViolation` for any transition other than
    /// `HANDSHAKE -> STATUS | LOGIN` or `LOGIN -> PLAY`.
    pub fn advance_stage(&self, next: Stage) -> Result<()> {
        let mut current = self.stage.load(Ordering::Acquire);
        loop {
            let from = Stage::from_u8(current);
            if !from.can_advance_to(next) {
                return Err(ProtocolError::HandshakeViolation(format!(
                    "Illegal stage transition {from:?} -> {next:?}"
                )));
            }
            match self.stage.compare_exchange(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    debug!(addr = %self.address, ?from, to = ?next, "Stage advanced");
                    return Ok(());
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub fn protocol_version(&self) -> i32 {
        self.protocol_version.load(Ordering::Acquire)
    }

    pub fn set_protocol_version(&self, version: i32) {
        self.protocol_version.store(version, Ordering::Release);
    }

    /// Record the name from login start. Only one login start is allowed.
    pub fn set_username(&self, username: String) -> Result<()> {
        self.username
            .set(username)
            .map_err(|_| ProtocolError::violation(constants::ERR_CHALLENGE_ALREADY_ISSUED))
    }

    pub fn username(&self) -> Option<&str> {
        self.username.get().map(String::as_str)
    }

    pub fn issue_challenge(&self, challenge: LoginChallenge) -> Result<&LoginChallenge> {
        self.challenge
            .set(challenge)
            .map_err(|_| ProtocolError::violation(constants::ERR_CHALLENGE_ALREADY_ISSUED))?;
        self.challenge
            .get()
            .ok_or_else(|| ProtocolError::violation(constants::ERR_CHALLENGE_MISSING))
    }

    pub fn challenge(&self) -> Option<&LoginChallenge> {
        self.challenge.get()
    }

    /// Install the negotiated secret. Exactly one call can succeed.
    ///
    /// # Errors
    /// `HandshakeViolation` if a secret is already installed; the existing
    /// secret is left untouched.
    pub fn install_secret(&self, secret: SharedSecret) -> Result<()> {
        self.secret
            .set(secret)
            .map_err(|_| ProtocolError::violation(constants::ERR_SECRET_ALREADY_SET))
    }

    pub fn shared_secret(&self) -> Option<&SharedSecret> {
        self.secret.get()
    }

    /// Flip the cipher flag. Requires an installed secret; one-way.
    pub fn enable_encryption(&self) -> Result<&SharedSecret> {
        let secret = self
            .secret
            .get()
            .ok_or_else(|| ProtocolError::violation(constants::ERR_SECRET_NOT_SET))?;
        self.encryption_enabled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ProtocolError::violation(constants::ERR_ENCRYPTION_ALREADY_ENABLED))?;
        Ok(secret)
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption_enabled.load(Ordering::Acquire)
    }

    /// Record the compression threshold. Only valid once, during `LOGIN`.
    pub fn enable_compression(&self, threshold: usize) -> Result<()> {
        if self.stage() != Stage::Login {
            return Err(ProtocolError::violation(
                constants::ERR_COMPRESSION_WRONG_STAGE,
            ));
        }
        let threshold = i32::try_from(threshold).map_err(|_| {
            ProtocolError::HandshakeViolation(format!("Compression threshold {threshold} too large"))
        })?;
        self.compression_threshold
            .compare_exchange(COMPRESSION_OFF, threshold, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ProtocolError::violation(constants::ERR_COMPRESSION_ALREADY_ENABLED))?;
        Ok(())
    }

    pub fn compression_threshold(&self) -> Option<usize> {
        usize::try_from(self.compression_threshold.load(Ordering::Acquire)).ok()
    }

    /// Attach the authenticated identity. A session links at most once.
    pub fn link_player(&self, profile: GameProfile) -> Result<()> {
        let mut slot = self.player.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(ProtocolError::violation(constants::ERR_ALREADY_AUTHENTICATED));
        }
        *slot = Some(profile);
        Ok(())
    }

    pub fn player(&self) -> Option<GameProfile> {
        self.player
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn player_id(&self) -> Option<Uuid> {
        self.player
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|p| p.id)
    }

    pub fn has_player(&self) -> bool {
        self.player_id().is_some()
    }

    /// Remove and return the linked identity.
    pub fn detach_player(&self) -> Option<GameProfile> {
        self.player
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Hand the command receiver to the connection task. Returns `None` after
    /// the first call.
    pub fn take_commands(&self) -> Option<mpsc::UnboundedReceiver<SessionCommand>> {
        self.commands_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Queue a packet for the connection task. Dropped silently once closed.
    pub fn send(&self, packet: ClientboundPacket) {
        let _ = self.commands_tx.send(SessionCommand::Send(packet));
    }

    /// Ask the connection task to send a disconnect notice and close.
    pub fn disconnect(&self, reason: impl Into<String>) {
        let _ = self.commands_tx.send(SessionCommand::Disconnect(reason.into()));
    }

    pub fn touch_keepalive(&self) {
        *self
            .last_keepalive
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn last_keepalive(&self) -> Instant {
        *self
            .last_keepalive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Signal the connection task to drop the socket.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("address", &self.address)
            .field("stage", &self.stage())
            .field("encrypted", &self.is_encrypted())
            .field("compression", &self.compression_threshold())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
