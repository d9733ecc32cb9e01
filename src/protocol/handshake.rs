//! Handshake, status and login coordinator.
//!
//! ```text
//! client                               server
//!   Handshake(version, next=LOGIN) ──►   stage = LOGIN
//!   LoginStart(name)               ──►   key pair + verify token
//!                                  ◄──   EncryptionRequest(der, token)
//!   EncryptionResponse(E(secret),  ──►   decrypt, compare token,
//!                      E(token))         install secret, cipher on
//!                                        session authority: hasJoined(name, hash)
//!                                  ◄──   [SetCompression(threshold)]
//!                                  ◄──   LoginSuccess(uuid, name)
//!                                        stage = PLAY
//! ```
//!
//! The verification call is awaited on the connection task, so no further
//! packets from that client are read until it resolves. It is bounded by the
//! configured request timeout and abandoned as soon as the session closes.
//!
//! Client-side helpers for building the encryption response live at the
//! bottom of this module.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use crate::error::{constants, ProtocolError, Result};
use crate::network::session::LoginChallenge;
use crate::protocol::dispatcher::{Directive, HandlerContext};
use crate::protocol::packets::{ClientboundPacket, ServerboundPacket, MAX_USERNAME_LENGTH};
use crate::protocol::{Stage, PROTOCOL_VERSION, VERSION_NAME};
use crate::service::auth::GameProfile;
use crate::service::scheduler::WorldTask;
use crate::utils::crypto::{self, LoginKeyPair, SharedSecret};
use crate::utils::timeout::with_timeout_error;

/// Server id sent in the encryption request. Empty since 1.7.
pub const SERVER_ID: &str = "";

#[derive(Serialize)]
struct StatusVersion<'a> {
    name: &'a str,
    protocol: i32,
}

#[derive(Serialize)]
struct StatusPlayers {
    max: u32,
    online: usize,
}

#[derive(Serialize)]
struct StatusDescription<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct StatusReply<'a> {
    version: StatusVersion<'a>,
    players: StatusPlayers,
    description: StatusDescription<'a>,
}

/// 1-16 characters of `[A-Za-z0-9_]`.
pub fn is_valid_username(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_USERNAME_LENGTH
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[instrument(skip(ctx), fields(addr = %ctx.session.address()))]
pub fn handle_handshake(
    ctx: &mut HandlerContext<'_>,
    protocol_version: i32,
    next_state: i32,
) -> Result<()> {
    let next = match next_state {
        1 => Stage::Status,
        2 => Stage::Login,
        _ => return Err(ProtocolError::violation(constants::ERR_INVALID_NEXT_STAGE)),
    };
    ctx.session.set_protocol_version(protocol_version);
    ctx.session.advance_stage(next)?;
    debug!(?next, "Handshake accepted");
    Ok(())
}

pub fn handle_status_request(ctx: &mut HandlerContext<'_>) -> Result<()> {
    let status = &ctx.server.config.status;
    let reply = StatusReply {
        version: StatusVersion {
            name: &status.version_name,
            protocol: PROTOCOL_VERSION,
        },
        players: StatusPlayers {
            max: status.max_players,
            online: ctx.server.registry.online_players(),
        },
        description: StatusDescription { text: &status.motd },
    };
    let json = serde_json::to_string(&reply)
        .map_err(|e| ProtocolError::MalformedFrame(format!("Status encoding failed: {e}")))?;
    ctx.send(&ClientboundPacket::StatusResponse { json })
}

pub fn handle_status_ping(ctx: &mut HandlerContext<'_>, payload: i64) -> Result<()> {
    ctx.server.metrics.status_ping();
    ctx.send(&ClientboundPacket::StatusPong { payload })?;
    ctx.push(Directive::Close);
    Ok(())
}

/// Login start: check version and name, then issue the key exchange.
#[instrument(skip(ctx), fields(addr = %ctx.session.address()))]
pub async fn handle_login_start(ctx: &mut HandlerContext<'_>, username: String) -> Result<()> {
    ctx.server.metrics.login_started();

    let version = ctx.session.protocol_version();
    if version != PROTOCOL_VERSION {
        let reason = if version < PROTOCOL_VERSION {
            format!("Outdated client! Please use {VERSION_NAME}")
        } else {
            format!("Outdated server! I'm still on {VERSION_NAME}")
        };
        debug!(version, "Rejecting protocol version");
        return Err(ProtocolError::HandshakeViolation(reason));
    }

    if !is_valid_username(&username) {
        return Err(ProtocolError::violation(constants::ERR_INVALID_USERNAME));
    }
    ctx.session.set_username(username.clone())?;
    ctx.server
        .registry
        .pending_logins()
        .begin(ctx.session.address(), &username);

    // RSA key generation is CPU bound; keep it off the reactor
    let keys = tokio::task::spawn_blocking(LoginKeyPair::generate)
        .await
        .map_err(|e| ProtocolError::CipherFault(format!("Key generation task failed: {e}")))??;
    let verify_token = crypto::generate_verify_token()?;

    let challenge = ctx.session.issue_challenge(LoginChallenge { keys, verify_token })?;
    let request = ClientboundPacket::EncryptionRequest {
        server_id: SERVER_ID.to_string(),
        public_key: challenge.keys.public_key_der().to_vec(),
        verify_token: verify_token.to_vec(),
    };
    ctx.send(&request)?;
    debug!(username = %username, "Encryption requested");
    Ok(())
}

/// Encryption response: prove key possession, start the cipher, verify identity.
#[instrument(skip(ctx, encrypted_secret, encrypted_token), fields(addr = %ctx.session.address()))]
pub async fn handle_encryption_response(
    ctx: &mut HandlerContext<'_>,
    encrypted_secret: &[u8],
    encrypted_token: &[u8],
) -> Result<()> {
    let session = ctx.session;
    let challenge = session
        .challenge()
        .ok_or_else(|| ProtocolError::violation(constants::ERR_CHALLENGE_MISSING))?;
    let username = session
        .username()
        .ok_or_else(|| ProtocolError::violation(constants::ERR_CHALLENGE_MISSING))?
        .to_string();

    let token = challenge.keys.decrypt(encrypted_token)?;
    if token.as_slice() != challenge.verify_token.as_slice() {
        warn!(username = %username, "Verify token mismatch");
        return Err(ProtocolError::violation(constants::ERR_TOKEN_MISMATCH));
    }

    let secret_bytes = Zeroizing::new(challenge.keys.decrypt(encrypted_secret)?);
    session.install_secret(SharedSecret::from_slice(&secret_bytes)?)?;
    let secret = session.enable_encryption()?;
    ctx.push(Directive::EnableEncryption);

    let server_hash = crypto::server_hash(SERVER_ID, secret, challenge.keys.public_key_der());
    let profile = authenticate(ctx, &username, &server_hash).await?;
    finish_login(ctx, profile)
}

async fn authenticate(
    ctx: &HandlerContext<'_>,
    username: &str,
    server_hash: &str,
) -> Result<GameProfile> {
    let timeout = ctx.server.config.auth.request_timeout;
    let verify = with_timeout_error(ctx.server.verifier.verify(username, server_hash), timeout);

    tokio::select! {
        result = verify => result.map_err(|e| match e {
            ProtocolError::Timeout(_) => {
                ProtocolError::AuthenticationFailure(constants::ERR_SESSION_UNREACHABLE.into())
            }
            ProtocolError::AuthenticationFailure(reason) => ProtocolError::AuthenticationFailure(reason),
            other => {
                warn!(error = %other, "Identity verification failed");
                ProtocolError::AuthenticationFailure(constants::ERR_SESSION_REJECTED.into())
            }
        }),
        _ = ctx.session.closed() => {
            debug!("Session closed during identity verification");
            Err(ProtocolError::ConnectionClosed)
        }
    }
}

fn finish_login(ctx: &mut HandlerContext<'_>, profile: GameProfile) -> Result<()> {
    let session = ctx.session;

    // Linking first makes a second login success unreachable
    session.link_player(profile.clone())?;

    if let Some(threshold) = ctx.server.config.transport.compression() {
        session.enable_compression(threshold)?;
        ctx.send(&ClientboundPacket::SetCompression {
            threshold: threshold as i32,
        })?;
        ctx.push(Directive::EnableCompression(threshold));
    }

    ctx.send(&ClientboundPacket::LoginSuccess {
        uuid: profile.dashed_id(),
        username: profile.name.clone(),
    })?;
    session.advance_stage(Stage::Play)?;
    session.touch_keepalive();

    ctx.server.registry.pending_logins().finish(session.address());
    ctx.server.metrics.login_succeeded();
    info!(
        addr = %session.address(),
        player = %profile.name,
        uuid = %profile.id,
        "Player logged in"
    );

    ctx.server.scheduler.submit(WorldTask::PlayerJoined {
        address: session.address(),
        profile,
    })
}

/// Client half of the key exchange: encrypt `secret` and the echoed token
/// for the server's public key.
pub fn client_encryption_response(
    public_key_der: &[u8],
    verify_token: &[u8],
    secret: &SharedSecret,
) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::EncryptionResponse {
        shared_secret: crypto::encrypt_for_public_key(public_key_der, secret.as_bytes())?,
        verify_token: crypto::encrypt_for_public_key(public_key_der, verify_token)?,
    })
}

/// Client handshake announcing `next_state` (1 status, 2 login).
pub fn client_handshake(host: &str, port: u16, next_state: i32) -> ServerboundPacket {
    ServerboundPacket::Handshake {
        protocol_version: PROTOCOL_VERSION,
        server_address: host.to_string(),
        server_port: port,
        next_state,
    }
}
