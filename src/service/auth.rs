//! Identity verification.
//!
//! After the stream cipher is up the gateway asks a session authority
//! whether `username` really joined with `server_hash`. The authority
//! answers with the canonical profile. Any failure on this path (non-200,
//! unreachable host, unparseable body, timeout) is an
//! `AuthenticationFailure`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{constants, ProtocolError, Result};
use crate::utils::timeout::with_timeout_error;

/// Largest session server response we are willing to buffer.
const MAX_RESPONSE_BYTES: u64 = 64 * 1024;

/// Canonical identity returned by the session authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameProfile {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub properties: Vec<ProfileProperty>,
}

impl GameProfile {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Dashed 8-4-4-4-12 form as sent in login success.
    pub fn dashed_id(&self) -> String {
        self.id.hyphenated().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileProperty {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Session server JSON: the id arrives without dashes.
#[derive(Debug, Deserialize)]
struct SessionReply {
    id: String,
    name: String,
    #[serde(default)]
    properties: Vec<ProfileProperty>,
}

impl TryFrom<SessionReply> for GameProfile {
    type Error = ProtocolError;

    fn try_from(reply: SessionReply) -> Result<Self> {
        let dashed = format_uuid(&reply.id)?;
        let id = Uuid::parse_str(&dashed).map_err(|_| {
            ProtocolError::AuthenticationFailure(format!("Invalid profile id '{}'", reply.id))
        })?;
        Ok(GameProfile {
            id,
            name: reply.name,
            properties: reply.properties,
        })
    }
}

/// Insert dashes into a 32-digit hex UUID, giving 8-4-4-4-12.
///
/// # Errors
/// `AuthenticationFailure` unless the input is exactly 32 hex digits.
pub fn format_uuid(compact: &str) -> Result<String> {
    if compact.len() != 32 || !compact.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ProtocolError::AuthenticationFailure(format!(
            "Invalid profile id '{compact}'"
        )));
    }
    Ok(format!(
        "{}-{}-{}-{}-{}",
        &compact[0..8],
        &compact[8..12],
        &compact[12..16],
        &compact[16..20],
        &compact[20..32]
    ))
}

/// The session authority consulted during login.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Confirm that `username` joined with `server_hash`.
    async fn verify(&self, username: &str, server_hash: &str) -> Result<GameProfile>;
}

/// Verifier that calls `<base>/session/minecraft/hasJoined`.
///
/// Requests go through a `ureq` agent on the blocking pool. `https://`
/// endpoints use rustls with the bundled web PKI roots.
#[derive(Debug, Clone)]
pub struct HttpSessionVerifier {
    agent: ureq::Agent,
    base: String,
    request_timeout: Duration,
}

impl HttpSessionVerifier {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let base = config.session_server.trim_end_matches('/');
        let host = base
            .strip_prefix("https://")
            .or_else(|| base.strip_prefix("http://"))
            .ok_or_else(|| {
                ProtocolError::ConfigError(format!(
                    "Session server must be an http:// or https:// URL: '{}'",
                    config.session_server
                ))
            })?;
        if host.is_empty() || host.starts_with('/') {
            return Err(ProtocolError::ConfigError(format!(
                "Session server URL has no host: '{}'",
                config.session_server
            )));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(config.request_timeout)
            .user_agent(concat!("gateway-protocol/", env!("CARGO_PKG_VERSION")))
            .build();

        Ok(Self {
            agent,
            base: base.to_string(),
            request_timeout: config.request_timeout,
        })
    }

    /// Endpoint queried for every verification, without the query string.
    pub fn has_joined_url(&self) -> String {
        format!("{}/session/minecraft/hasJoined", self.base)
    }

    fn request(&self, username: &str, server_hash: &str) -> ureq::Request {
        self.agent
            .get(&self.has_joined_url())
            .query("username", username)
            .query("serverId", server_hash)
            .set("Accept", "application/json")
    }
}

/// What the session server said, before it becomes a profile.
enum Reply {
    Joined(SessionReply),
    Status(u16),
}

fn call(request: ureq::Request) -> Result<Reply> {
    let response = match request.call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, _)) => return Ok(Reply::Status(code)),
        Err(e) => {
            warn!(error = %e, "Session server request failed");
            return Err(ProtocolError::AuthenticationFailure(
                constants::ERR_SESSION_UNREACHABLE.into(),
            ));
        }
    };

    let status = response.status();
    debug!(status, "Session server replied");
    if status != 200 {
        return Ok(Reply::Status(status));
    }

    let body = response.into_reader().take(MAX_RESPONSE_BYTES);
    serde_json::from_reader(body).map(Reply::Joined).map_err(|e| {
        warn!(error = %e, "Unparseable session server reply");
        ProtocolError::AuthenticationFailure(constants::ERR_SESSION_REJECTED.into())
    })
}

#[async_trait]
impl IdentityVerifier for HttpSessionVerifier {
    #[instrument(skip(self, server_hash), fields(base = %self.base))]
    async fn verify(&self, username: &str, server_hash: &str) -> Result<GameProfile> {
        let request = self.request(username, server_hash);
        let pending = tokio::task::spawn_blocking(move || call(request));

        let unreachable =
            || ProtocolError::AuthenticationFailure(constants::ERR_SESSION_UNREACHABLE.into());
        let reply = with_timeout_error(
            async { pending.await.map_err(|_| unreachable()) },
            self.request_timeout,
        )
        .await
        .map_err(|_| unreachable())??;

        match reply {
            Reply::Joined(reply) => GameProfile::try_from(reply),
            Reply::Status(status) => {
                debug!(status, "Session server did not confirm the join");
                Err(ProtocolError::AuthenticationFailure(
                    constants::ERR_SESSION_REJECTED.into(),
                ))
            }
        }
    }
}
