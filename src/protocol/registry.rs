//! Packet registry.
//!
//! A static table maps `(stage, direction, id)` to a [`PacketKind`] and, for
//! serverbound entries, to the body decoder. The lookup maps are built once
//! on first use and never change, so concurrent readers need no locking.

use std::collections::HashMap;
use std::sync::OnceLock;

use bytes::{Buf, BytesMut};

use super::packets::{self, ClientboundPacket, DecodeFn, DecodeLimits, PacketKind, ServerboundPacket};
use super::{Direction, Stage};
use crate::core::packet::RawPacket;
use crate::error::{constants, ProtocolError, Result};

struct Entry {
    stage: Stage,
    direction: Direction,
    id: i32,
    kind: PacketKind,
    decode: Option<DecodeFn>,
}

const fn serverbound(stage: Stage, id: i32, kind: PacketKind, decode: DecodeFn) -> Entry {
    Entry {
        stage,
        direction: Direction::Serverbound,
        id,
        kind,
        decode: Some(decode),
    }
}

const fn clientbound(stage: Stage, id: i32, kind: PacketKind) -> Entry {
    Entry {
        stage,
        direction: Direction::Clientbound,
        id,
        kind,
        decode: None,
    }
}

#[rustfmt::skip]
static TABLE: &[Entry] = &[
    serverbound(Stage::Handshake, 0x00, PacketKind::Handshake, packets::decode_handshake),

    serverbound(Stage::Status, 0x00, PacketKind::StatusRequest, packets::decode_status_request),
    serverbound(Stage::Status, 0x01, PacketKind::StatusPing, packets::decode_status_ping),
    clientbound(Stage::Status, 0x00, PacketKind::StatusResponse),
    clientbound(Stage::Status, 0x01, PacketKind::StatusPong),

    serverbound(Stage::Login, 0x00, PacketKind::LoginStart, packets::decode_login_start),
    serverbound(Stage::Login, 0x01, PacketKind::EncryptionResponse, packets::decode_encryption_response),
    clientbound(Stage::Login, 0x00, PacketKind::LoginDisconnect),
    clientbound(Stage::Login, 0x01, PacketKind::EncryptionRequest),
    clientbound(Stage::Login, 0x02, PacketKind::LoginSuccess),
    clientbound(Stage::Login, 0x03, PacketKind::SetCompression),

    serverbound(Stage::Play, 0x00, PacketKind::KeepAliveResponse, packets::decode_keep_alive),
    serverbound(Stage::Play, 0x01, PacketKind::ChatMessage, packets::decode_chat),
    serverbound(Stage::Play, 0x03, PacketKind::PlayerGround, packets::decode_player_ground),
    serverbound(Stage::Play, 0x04, PacketKind::PlayerPosition, packets::decode_player_position),
    serverbound(Stage::Play, 0x05, PacketKind::PlayerLook, packets::decode_player_look),
    serverbound(Stage::Play, 0x06, PacketKind::PlayerPositionLook, packets::decode_player_position_look),
    serverbound(Stage::Play, 0x07, PacketKind::PlayerDigging, packets::decode_player_digging),
    serverbound(Stage::Play, 0x08, PacketKind::BlockPlacement, packets::decode_block_placement),
    serverbound(Stage::Play, 0x09, PacketKind::HeldItemChange, packets::decode_held_item_change),
    serverbound(Stage::Play, 0x0A, PacketKind::Animation, packets::decode_animation),
    serverbound(Stage::Play, 0x0B, PacketKind::EntityAction, packets::decode_entity_action),
    serverbound(Stage::Play, 0x10, PacketKind::CreativeInventoryAction, packets::decode_creative_inventory_action),
    serverbound(Stage::Play, 0x15, PacketKind::ClientSettings, packets::decode_client_settings),
    serverbound(Stage::Play, 0x16, PacketKind::ClientStatus, packets::decode_client_status),
    serverbound(Stage::Play, 0x17, PacketKind::PluginMessageIn, packets::decode_plugin_message),
    clientbound(Stage::Play, 0x00, PacketKind::KeepAlive),
    clientbound(Stage::Play, 0x02, PacketKind::ChatOut),
    clientbound(Stage::Play, 0x05, PacketKind::SpawnPosition),
    clientbound(Stage::Play, 0x21, PacketKind::ChunkData),
    clientbound(Stage::Play, 0x3F, PacketKind::PluginMessageOut),
    clientbound(Stage::Play, 0x40, PacketKind::PlayDisconnect),
];

/// Immutable lookup maps built from the static table.
pub struct PacketRegistry {
    decoders: HashMap<(Stage, i32), DecodeFn>,
    ids: HashMap<PacketKind, (Stage, Direction, i32)>,
    limits: DecodeLimits,
}

impl PacketRegistry {
    /// The process-wide registry with default decode limits.
    pub fn global() -> &'static PacketRegistry {
        static REGISTRY: OnceLock<PacketRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| PacketRegistry::with_limits(DecodeLimits::default()))
    }

    pub fn with_limits(limits: DecodeLimits) -> Self {
        let mut decoders = HashMap::new();
        let mut ids = HashMap::new();
        for entry in TABLE {
            if let Some(decode) = entry.decode {
                decoders.insert((entry.stage, entry.id), decode);
            }
            ids.insert(entry.kind, (entry.stage, entry.direction, entry.id));
        }
        Self {
            decoders,
            ids,
            limits,
        }
    }

    /// Decode a serverbound packet received while the session is in `stage`.
    ///
    /// # Errors
    /// - `UnknownPacketId` if nothing is registered for `(stage, id)`
    /// - `MalformedFrame` if the body is short or has bytes left over
    pub fn decode(&self, stage: Stage, raw: RawPacket) -> Result<ServerboundPacket> {
        let decode = self
            .decoders
            .get(&(stage, raw.id))
            .ok_or(ProtocolError::UnknownPacketId {
                stage,
                direction: Direction::Serverbound,
                id: raw.id,
            })?;

        let mut body = raw.body;
        let packet = decode(&mut body, &self.limits)?;
        if body.has_remaining() {
            return Err(ProtocolError::malformed(constants::ERR_TRAILING_BYTES));
        }
        Ok(packet)
    }

    /// Encode a clientbound packet for a session in `stage`.
    ///
    /// # Errors
    /// `UnknownPacketId` if the packet does not belong to `stage`.
    pub fn encode(&self, stage: Stage, packet: &ClientboundPacket) -> Result<RawPacket> {
        let id = self.id_for(stage, Direction::Clientbound, packet.kind())?;
        let mut body = BytesMut::new();
        packet.encode_body(&mut body);
        Ok(RawPacket::new(id, body.freeze()))
    }

    /// Encode a serverbound packet, as a client would.
    pub fn encode_serverbound(&self, stage: Stage, packet: &ServerboundPacket) -> Result<RawPacket> {
        let id = self.id_for(stage, Direction::Serverbound, packet.kind())?;
        let mut body = BytesMut::new();
        packet.encode_body(&mut body);
        Ok(RawPacket::new(id, body.freeze()))
    }

    fn id_for(&self, stage: Stage, direction: Direction, kind: PacketKind) -> Result<i32> {
        match self.ids.get(&kind) {
            Some(&(s, d, id)) if s == stage && d == direction => Ok(id),
            Some(&(_, _, id)) => Err(ProtocolError::UnknownPacketId {
                stage,
                direction,
                id,
            }),
            None => Err(ProtocolError::UnknownPacketId {
                stage,
                direction,
                id: -1,
            }),
        }
    }

}
