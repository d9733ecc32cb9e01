//! The simulation collaborator.
//!
//! The gateway never touches entity, inventory or chunk state itself. It
//! reports joins, departures and player input through [`World`], always
//! from the scheduler's thread rather than from a connection task.

use bytes::Bytes;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::protocol::packets::BlockPosition;
use crate::service::auth::GameProfile;

/// Player input forwarded from `PLAY` packets.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    Chat(String),
    Ground {
        on_ground: bool,
    },
    Move {
        x: f64,
        y: f64,
        z: f64,
        on_ground: bool,
    },
    Look {
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    MoveLook {
        x: f64,
        y: f64,
        z: f64,
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    SwingArm,
    Dig {
        status: u8,
        location: BlockPosition,
        face: i8,
    },
    PlaceBlock {
        location: BlockPosition,
        face: i8,
        held_item: Bytes,
        cursor: [u8; 3],
    },
    SelectSlot(i16),
    EntityAction {
        action: u8,
        jump_boost: i32,
    },
    CreativeSlot {
        slot: i16,
        item: Bytes,
    },
    Settings {
        locale: String,
        view_distance: i8,
        chat_mode: i8,
        chat_colors: bool,
        skin_parts: u8,
    },
    ClientStatus(i32),
    PluginMessage {
        channel: String,
        data: Bytes,
    },
}

pub trait World: Send {
    fn player_joined(&mut self, profile: &GameProfile, address: SocketAddr);

    fn player_left(&mut self, profile: &GameProfile);

    fn player_action(&mut self, player: Uuid, action: PlayerAction);
}
