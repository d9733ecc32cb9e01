//! # Error Types
//!
//! Error handling for the gateway protocol.
//!
//! Every connection-level failure maps onto one variant of [`ProtocolError`].
//! All of them are fatal to the affected connection and to nothing else:
//! the session is torn down and removed from the registry, other sessions
//! and process-wide state are untouched.
//!
//! ## Error Categories
//! - **Framing**: `MalformedFrame`, `UnknownPacketId`, `CompressionMismatch`
//! - **Handshake**: `HandshakeViolation`, `AuthenticationFailure`
//! - **Cryptographic**: `CipherFault`
//! - **I/O and lifecycle**: `Io`, `ConnectionClosed`, `Timeout`
//!
//! ## Example Usage
//! ```rust
//! use gateway_protocol::error::{ProtocolError, Result};
//! use tracing::error;
//!
//! fn check_token(expected: &[u8], received: &[u8]) -> Result<()> {
//!     if expected != received {
//!         return Err(ProtocolError::HandshakeViolation("verify token mismatch".into()));
//!     }
//!     Ok(())
//! }
//!
//! if let Err(e) = check_token(&[1, 2, 3, 4], &[4, 3, 2, 1]) {
//!     error!(error = %e, "login rejected");
//! }
//! ```

use crate::protocol::{Direction, Stage};
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Framing errors
    pub const ERR_VARINT_TOO_LONG: &str = "VarInt exceeds 5 bytes";
    pub const ERR_NEGATIVE_LENGTH: &str = "Negative length prefix";
    pub const ERR_TRUNCATED: &str = "Frame body ended before field was complete";
    pub const ERR_TRAILING_BYTES: &str = "Packet body has trailing bytes";
    pub const ERR_INVALID_UTF8: &str = "String is not valid UTF-8";

    /// Handshake errors
    pub const ERR_TOKEN_MISMATCH: &str = "Verify token mismatch";
    pub const ERR_SECRET_ALREADY_SET: &str = "Shared secret already installed";
    pub const ERR_SECRET_NOT_SET: &str = "Shared secret not installed";
    pub const ERR_ENCRYPTION_ALREADY_ENABLED: &str = "Encryption already enabled";
    pub const ERR_COMPRESSION_ALREADY_ENABLED: &str = "Compression already enabled";
    pub const ERR_COMPRESSION_WRONG_STAGE: &str = "Compression may only be enabled during login";
    pub const ERR_CHALLENGE_ALREADY_ISSUED: &str = "Login already started";
    pub const ERR_CHALLENGE_MISSING: &str = "Encryption response without login start";
    pub const ERR_ALREADY_AUTHENTICATED: &str = "Session already has a linked player";
    pub const ERR_NOT_AUTHENTICATED: &str = "Play packet before login completed";
    pub const ERR_INVALID_USERNAME: &str = "Invalid username";
    pub const ERR_INVALID_NEXT_STAGE: &str = "Handshake requested an invalid next stage";

    /// Authentication errors
    pub const ERR_SESSION_REJECTED: &str = "Failed to verify username";
    pub const ERR_SESSION_UNREACHABLE: &str = "Authentication servers are unreachable";

    /// Cipher errors
    pub const ERR_BAD_KEY_MATERIAL: &str = "Invalid AES key or IV length";
    pub const ERR_RSA_DECRYPT: &str = "RSA decryption failed";

    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_LOGIN_TIMEOUT: &str = "Took too long to log in";
    pub const ERR_KEEPALIVE_TIMEOUT: &str = "Timed out";
}

// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    #[serde(skip_serializing, skip_deserializing)]
    Io(#[from] io::Error),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Unknown packet id 0x{id:02X} for {stage:?}/{direction:?}")]
    UnknownPacketId {
        stage: Stage,
        direction: Direction,
        id: i32,
    },

    #[error("Compression mismatch: declared {declared} bytes, decompressed {actual}")]
    CompressionMismatch { declared: usize, actual: usize },

    #[error("Handshake violation: {0}")]
    HandshakeViolation(String),

    #[error("Authentication failure: {0}")]
    AuthenticationFailure(String),

    #[error("Cipher fault: {0}")]
    CipherFault(String),

    #[error("Compression failed")]
    CompressionFailure,

    #[error("Decompression failed")]
    DecompressionFailure,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout occurred: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Whether the peer should receive a disconnect notice carrying this error.
    ///
    /// Framing and cipher failures mean the stream can no longer be trusted,
    /// so the socket is simply closed for those.
    pub fn is_client_visible(&self) -> bool {
        matches!(
            self,
            ProtocolError::HandshakeViolation(_) | ProtocolError::AuthenticationFailure(_)
        )
    }

    /// Short human-readable reason for the disconnect packet.
    pub fn disconnect_reason(&self) -> String {
        match self {
            ProtocolError::AuthenticationFailure(reason) => reason.clone(),
            ProtocolError::HandshakeViolation(reason) => reason.clone(),
            other => other.to_string(),
        }
    }

    pub(crate) fn malformed(msg: &str) -> Self {
        ProtocolError::MalformedFrame(msg.to_string())
    }

    pub(crate) fn violation(msg: &str) -> Self {
        ProtocolError::HandshakeViolation(msg.to_string())
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
