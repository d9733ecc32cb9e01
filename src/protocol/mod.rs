//! # Protocol Layer
//!
//! Typed packets, the packet registry, dispatch, and the handshake/login
//! state machine.
//!
//! ## Stages
//! ```text
//! HANDSHAKE ──► STATUS
//!     │
//!     └──────► LOGIN ──► PLAY
//! ```
//! Transitions only move forward. Packet ids are scoped to a
//! (stage, direction) pair, so the same id means different packets in
//! different stages.

pub mod dispatcher;
pub mod handshake;
pub mod packets;
pub mod play;
pub mod registry;


use serde::{Deserialize, Serialize};

/// Protocol version spoken by this server.
pub const PROTOCOL_VERSION: i32 = 47;

/// Human-readable name of [`PROTOCOL_VERSION`].
pub const VERSION_NAME: &str = "1.8.9";

/// One of the four sequential protocol phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Stage {
    Handshake = 0,
    Status = 1,
    Login = 2,
    Play = 3,
}

impl Stage {
    pub(crate) fn from_u8(value: u8) -> Stage {
        match value {
            1 => Stage::Status,
            2 => Stage::Login,
            3 => Stage::Play,
            _ => Stage::Handshake,
        }
    }

    /// Whether `next` is a legal forward transition from `self`.
    pub fn can_advance_to(self, next: Stage) -> bool {
        matches!(
            (self, next),
            (Stage::Handshake, Stage::Status)
                | (Stage::Handshake, Stage::Login)
                | (Stage::Login, Stage::Play)
        )
    }
}

/// Packet direction relative to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Client to server
    Serverbound,
    /// Server to client
    Clientbound,
}
