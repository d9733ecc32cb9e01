//! Typed packets and their body codecs.
//!
//! Serverbound packets are only ever decoded and clientbound packets are
//! only ever encoded, so each side implements just the half it needs. The
//! numeric ids live in the registry, not here.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::core::wire;
use crate::error::Result;

/// Longest username the login stage accepts.
pub const MAX_USERNAME_LENGTH: usize = 16;

/// Longest chat line a client may send.
pub const MAX_CHAT_LENGTH: usize = 100;

/// Longest plugin channel name.
pub const MAX_CHANNEL_LENGTH: usize = 20;

/// Longest server address a handshake may carry.
pub const MAX_HOST_LENGTH: usize = 255;

/// Upper bound for the RSA blobs in an encryption response.
pub const MAX_RSA_BLOB_LENGTH: usize = 256;

/// Longest locale tag in client settings.
pub const MAX_LOCALE_LENGTH: usize = 16;

/// Trailing cursor bytes of a block placement.
const CURSOR_LEN: usize = 3;

/// Per-connection limits applied while decoding bodies.
#[derive(Debug, Clone, Copy)]
pub struct DecodeLimits {
    pub max_string_length: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_string_length: wire::MAX_STRING_LENGTH,
        }
    }
}

impl DecodeLimits {
    fn cap(&self, field_max: usize) -> usize {
        field_max.min(self.max_string_length)
    }
}

/// Identity of every packet type, independent of its numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    // Serverbound
    Handshake,
    StatusRequest,
    StatusPing,
    LoginStart,
    EncryptionResponse,
    KeepAliveResponse,
    ChatMessage,
    PlayerGround,
    PlayerPosition,
    PlayerLook,
    PlayerPositionLook,
    Animation,
    PlayerDigging,
    BlockPlacement,
    HeldItemChange,
    EntityAction,
    CreativeInventoryAction,
    ClientSettings,
    ClientStatus,
    PluginMessageIn,

    // Clientbound
    StatusResponse,
    StatusPong,
    LoginDisconnect,
    EncryptionRequest,
    LoginSuccess,
    SetCompression,
    KeepAlive,
    ChatOut,
    SpawnPosition,
    ChunkData,
    PluginMessageOut,
    PlayDisconnect,
}

/// Packets the server receives.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerboundPacket {
    Handshake {
        protocol_version: i32,
        server_address: String,
        server_port: u16,
        next_state: i32,
    },
    StatusRequest,
    StatusPing {
        payload: i64,
    },
    LoginStart {
        username: String,
    },
    EncryptionResponse {
        shared_secret: Vec<u8>,
        verify_token: Vec<u8>,
    },
    KeepAlive {
        id: i32,
    },
    ChatMessage {
        message: String,
    },
    PlayerGround {
        on_ground: bool,
    },
    PlayerPosition {
        x: f64,
        y: f64,
        z: f64,
        on_ground: bool,
    },
    PlayerLook {
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    PlayerPositionLook {
        x: f64,
        y: f64,
        z: f64,
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    Animation,
    PlayerDigging {
        status: u8,
        location: BlockPosition,
        face: i8,
    },
    /// The held item is an opaque slot blob; the world owns item semantics.
    BlockPlacement {
        location: BlockPosition,
        face: i8,
        held_item: Bytes,
        cursor: [u8; 3],
    },
    HeldItemChange {
        slot: i16,
    },
    EntityAction {
        entity_id: i32,
        action: u8,
        jump_boost: i32,
    },
    CreativeInventoryAction {
        slot: i16,
        item: Bytes,
    },
    ClientSettings {
        locale: String,
        view_distance: i8,
        chat_mode: i8,
        chat_colors: bool,
        skin_parts: u8,
    },
    ClientStatus {
        action: i32,
    },
    PluginMessage {
        channel: String,
        data: Bytes,
    },
}

impl ServerboundPacket {
    pub fn kind(&self) -> PacketKind {
        match self {
            ServerboundPacket::Handshake { .. } => PacketKind::Handshake,
            ServerboundPacket::StatusRequest => PacketKind::StatusRequest,
            ServerboundPacket::StatusPing { .. } => PacketKind::StatusPing,
            ServerboundPacket::LoginStart { .. } => PacketKind::LoginStart,
            ServerboundPacket::EncryptionResponse { .. } => PacketKind::EncryptionResponse,
            ServerboundPacket::KeepAlive { .. } => PacketKind::KeepAliveResponse,
            ServerboundPacket::ChatMessage { .. } => PacketKind::ChatMessage,
            ServerboundPacket::PlayerGround { .. } => PacketKind::PlayerGround,
            ServerboundPacket::PlayerPosition { .. } => PacketKind::PlayerPosition,
            ServerboundPacket::PlayerLook { .. } => PacketKind::PlayerLook,
            ServerboundPacket::PlayerPositionLook { .. } => PacketKind::PlayerPositionLook,
            ServerboundPacket::Animation => PacketKind::Animation,
            ServerboundPacket::PlayerDigging { .. } => PacketKind::PlayerDigging,
            ServerboundPacket::BlockPlacement { .. } => PacketKind::BlockPlacement,
            ServerboundPacket::HeldItemChange { .. } => PacketKind::HeldItemChange,
            ServerboundPacket::EntityAction { .. } => PacketKind::EntityAction,
            ServerboundPacket::CreativeInventoryAction { .. } => PacketKind::CreativeInventoryAction,
            ServerboundPacket::ClientSettings { .. } => PacketKind::ClientSettings,
            ServerboundPacket::ClientStatus { .. } => PacketKind::ClientStatus,
            ServerboundPacket::PluginMessage { .. } => PacketKind::PluginMessageIn,
        }
    }

    /// Client-side encoding, used by test clients and tooling.
    pub fn encode_body(&self, buf: &mut BytesMut) {
        match self {
            ServerboundPacket::Handshake {
                protocol_version,
                server_address,
                server_port,
                next_state,
            } => {
                wire::write_var_i32(buf, *protocol_version);
                wire::write_string(buf, server_address);
                buf.put_u16(*server_port);
                wire::write_var_i32(buf, *next_state);
            }
            ServerboundPacket::StatusRequest | ServerboundPacket::Animation => {}
            ServerboundPacket::StatusPing { payload } => buf.put_i64(*payload),
            ServerboundPacket::LoginStart { username } => wire::write_string(buf, username),
            ServerboundPacket::EncryptionResponse {
                shared_secret,
                verify_token,
            } => {
                wire::write_byte_array(buf, shared_secret);
                wire::write_byte_array(buf, verify_token);
            }
            ServerboundPacket::KeepAlive { id } => wire::write_var_i32(buf, *id),
            ServerboundPacket::ChatMessage { message } => wire::write_string(buf, message),
            ServerboundPacket::PlayerGround { on_ground } => buf.put_u8(u8::from(*on_ground)),
            ServerboundPacket::PlayerPosition { x, y, z, on_ground } => {
                buf.put_f64(*x);
                buf.put_f64(*y);
                buf.put_f64(*z);
                buf.put_u8(u8::from(*on_ground));
            }
            ServerboundPacket::PlayerLook {
                yaw,
                pitch,
                on_ground,
            } => {
                buf.put_f32(*yaw);
                buf.put_f32(*pitch);
                buf.put_u8(u8::from(*on_ground));
            }
            ServerboundPacket::PlayerPositionLook {
                x,
                y,
                z,
                yaw,
                pitch,
                on_ground,
            } => {
                buf.put_f64(*x);
                buf.put_f64(*y);
                buf.put_f64(*z);
                buf.put_f32(*yaw);
                buf.put_f32(*pitch);
                buf.put_u8(u8::from(*on_ground));
            }
            ServerboundPacket::PlayerDigging {
                status,
                location,
                face,
            } => {
                buf.put_u8(*status);
                buf.put_i64(location.pack());
                buf.put_i8(*face);
            }
            ServerboundPacket::BlockPlacement {
                location,
                face,
                held_item,
                cursor,
            } => {
                buf.put_i64(location.pack());
                buf.put_i8(*face);
                buf.put_slice(held_item);
                buf.put_slice(cursor);
            }
            ServerboundPacket::HeldItemChange { slot } => buf.put_i16(*slot),
            ServerboundPacket::EntityAction {
                entity_id,
                action,
                jump_boost,
            } => {
                wire::write_var_i32(buf, *entity_id);
                buf.put_u8(*action);
                wire::write_var_i32(buf, *jump_boost);
            }
            ServerboundPacket::CreativeInventoryAction { slot, item } => {
                buf.put_i16(*slot);
                buf.put_slice(item);
            }
            ServerboundPacket::ClientSettings {
                locale,
                view_distance,
                chat_mode,
                chat_colors,
                skin_parts,
            } => {
                wire::write_string(buf, locale);
                buf.put_i8(*view_distance);
                buf.put_i8(*chat_mode);
                buf.put_u8(u8::from(*chat_colors));
                buf.put_u8(*skin_parts);
            }
            ServerboundPacket::ClientStatus { action } => wire::write_var_i32(buf, *action),
            ServerboundPacket::PluginMessage { channel, data } => {
                wire::write_string(buf, channel);
                buf.put_slice(data);
            }
        }
    }
}

/// Signature shared by every serverbound body decoder.
pub type DecodeFn = fn(&mut Bytes, &DecodeLimits) -> Result<ServerboundPacket>;

pub(crate) fn decode_handshake(buf: &mut Bytes, limits: &DecodeLimits) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::Handshake {
        protocol_version: wire::read_var_i32(buf)?,
        server_address: wire::read_string(buf, limits.cap(MAX_HOST_LENGTH))?,
        server_port: wire::read_u16(buf)?,
        next_state: wire::read_var_i32(buf)?,
    })
}

pub(crate) fn decode_status_request(_: &mut Bytes, _: &DecodeLimits) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::StatusRequest)
}

pub(crate) fn decode_status_ping(buf: &mut Bytes, _: &DecodeLimits) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::StatusPing {
        payload: wire::read_i64(buf)?,
    })
}

pub(crate) fn decode_login_start(buf: &mut Bytes, limits: &DecodeLimits) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::LoginStart {
        username: wire::read_string(buf, limits.cap(MAX_USERNAME_LENGTH))?,
    })
}

pub(crate) fn decode_encryption_response(
    buf: &mut Bytes,
    _: &DecodeLimits,
) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::EncryptionResponse {
        shared_secret: wire::read_byte_array(buf, MAX_RSA_BLOB_LENGTH)?,
        verify_token: wire::read_byte_array(buf, MAX_RSA_BLOB_LENGTH)?,
    })
}

pub(crate) fn decode_keep_alive(buf: &mut Bytes, _: &DecodeLimits) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::KeepAlive {
        id: wire::read_var_i32(buf)?,
    })
}

pub(crate) fn decode_chat(buf: &mut Bytes, limits: &DecodeLimits) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::ChatMessage {
        message: wire::read_string(buf, limits.cap(MAX_CHAT_LENGTH))?,
    })
}

pub(crate) fn decode_player_ground(buf: &mut Bytes, _: &DecodeLimits) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::PlayerGround {
        on_ground: wire::read_bool(buf)?,
    })
}

pub(crate) fn decode_player_position(
    buf: &mut Bytes,
    _: &DecodeLimits,
) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::PlayerPosition {
        x: wire::read_f64(buf)?,
        y: wire::read_f64(buf)?,
        z: wire::read_f64(buf)?,
        on_ground: wire::read_bool(buf)?,
    })
}

pub(crate) fn decode_player_look(buf: &mut Bytes, _: &DecodeLimits) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::PlayerLook {
        yaw: wire::read_f32(buf)?,
        pitch: wire::read_f32(buf)?,
        on_ground: wire::read_bool(buf)?,
    })
}

pub(crate) fn decode_player_position_look(
    buf: &mut Bytes,
    _: &DecodeLimits,
) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::PlayerPositionLook {
        x: wire::read_f64(buf)?,
        y: wire::read_f64(buf)?,
        z: wire::read_f64(buf)?,
        yaw: wire::read_f32(buf)?,
        pitch: wire::read_f32(buf)?,
        on_ground: wire::read_bool(buf)?,
    })
}

pub(crate) fn decode_animation(_: &mut Bytes, _: &DecodeLimits) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::Animation)
}

pub(crate) fn decode_player_digging(buf: &mut Bytes, _: &DecodeLimits) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::PlayerDigging {
        status: wire::read_u8(buf)?,
        location: BlockPosition::unpack(wire::read_i64(buf)?),
        face: wire::read_i8(buf)?,
    })
}

pub(crate) fn decode_block_placement(
    buf: &mut Bytes,
    _: &DecodeLimits,
) -> Result<ServerboundPacket> {
    let location = BlockPosition::unpack(wire::read_i64(buf)?);
    let face = wire::read_i8(buf)?;
    // Slot data is variable length; the three cursor bytes close the frame
    wire::ensure_remaining(buf, CURSOR_LEN)?;
    let held_item = buf.split_to(buf.len() - CURSOR_LEN);
    let cursor = [wire::read_u8(buf)?, wire::read_u8(buf)?, wire::read_u8(buf)?];
    Ok(ServerboundPacket::BlockPlacement {
        location,
        face,
        held_item,
        cursor,
    })
}

pub(crate) fn decode_held_item_change(
    buf: &mut Bytes,
    _: &DecodeLimits,
) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::HeldItemChange {
        slot: wire::read_i16(buf)?,
    })
}

pub(crate) fn decode_entity_action(buf: &mut Bytes, _: &DecodeLimits) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::EntityAction {
        entity_id: wire::read_var_i32(buf)?,
        action: wire::read_u8(buf)?,
        jump_boost: wire::read_var_i32(buf)?,
    })
}

pub(crate) fn decode_creative_inventory_action(
    buf: &mut Bytes,
    _: &DecodeLimits,
) -> Result<ServerboundPacket> {
    let slot = wire::read_i16(buf)?;
    Ok(ServerboundPacket::CreativeInventoryAction {
        slot,
        item: std::mem::take(buf),
    })
}

pub(crate) fn decode_client_settings(
    buf: &mut Bytes,
    limits: &DecodeLimits,
) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::ClientSettings {
        locale: wire::read_string(buf, limits.cap(MAX_LOCALE_LENGTH))?,
        view_distance: wire::read_i8(buf)?,
        chat_mode: wire::read_i8(buf)?,
        chat_colors: wire::read_bool(buf)?,
        skin_parts: wire::read_u8(buf)?,
    })
}

pub(crate) fn decode_client_status(buf: &mut Bytes, _: &DecodeLimits) -> Result<ServerboundPacket> {
    Ok(ServerboundPacket::ClientStatus {
        action: wire::read_var_i32(buf)?,
    })
}

pub(crate) fn decode_plugin_message(
    buf: &mut Bytes,
    limits: &DecodeLimits,
) -> Result<ServerboundPacket> {
    let channel = wire::read_string(buf, limits.cap(MAX_CHANNEL_LENGTH))?;
    // The payload runs to the end of the frame
    let data = std::mem::take(buf);
    Ok(ServerboundPacket::PluginMessage { channel, data })
}

/// Packets the server sends.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientboundPacket {
    StatusResponse {
        json: String,
    },
    StatusPong {
        payload: i64,
    },
    LoginDisconnect {
        reason: String,
    },
    EncryptionRequest {
        server_id: String,
        public_key: Vec<u8>,
        verify_token: Vec<u8>,
    },
    LoginSuccess {
        uuid: String,
        username: String,
    },
    SetCompression {
        threshold: i32,
    },
    KeepAlive {
        id: i32,
    },
    ChatMessage {
        json: String,
        position: u8,
    },
    SpawnPosition {
        x: i32,
        y: i32,
        z: i32,
    },
    /// Column payload is opaque to the gateway.
    ChunkData {
        chunk_x: i32,
        chunk_z: i32,
        ground_up: bool,
        bitmask: u16,
        data: Bytes,
    },
    PluginMessage {
        channel: String,
        data: Bytes,
    },
    PlayDisconnect {
        reason: String,
    },
}

impl ClientboundPacket {
    pub fn kind(&self) -> PacketKind {
        match self {
            ClientboundPacket::StatusResponse { .. } => PacketKind::StatusResponse,
            ClientboundPacket::StatusPong { .. } => PacketKind::StatusPong,
            ClientboundPacket::LoginDisconnect { .. } => PacketKind::LoginDisconnect,
            ClientboundPacket::EncryptionRequest { .. } => PacketKind::EncryptionRequest,
            ClientboundPacket::LoginSuccess { .. } => PacketKind::LoginSuccess,
            ClientboundPacket::SetCompression { .. } => PacketKind::SetCompression,
            ClientboundPacket::KeepAlive { .. } => PacketKind::KeepAlive,
            ClientboundPacket::ChatMessage { .. } => PacketKind::ChatOut,
            ClientboundPacket::SpawnPosition { .. } => PacketKind::SpawnPosition,
            ClientboundPacket::ChunkData { .. } => PacketKind::ChunkData,
            ClientboundPacket::PluginMessage { .. } => PacketKind::PluginMessageOut,
            ClientboundPacket::PlayDisconnect { .. } => PacketKind::PlayDisconnect,
        }
    }

    /// Login-stage disconnect with `reason` wrapped as a chat component.
    pub fn login_disconnect(reason: &str) -> Self {
        ClientboundPacket::LoginDisconnect {
            reason: chat_text(reason),
        }
    }

    /// Play-stage disconnect with `reason` wrapped as a chat component.
    pub fn play_disconnect(reason: &str) -> Self {
        ClientboundPacket::PlayDisconnect {
            reason: chat_text(reason),
        }
    }

    pub fn encode_body(&self, buf: &mut BytesMut) {
        match self {
            ClientboundPacket::StatusResponse { json } => wire::write_string(buf, json),
            ClientboundPacket::StatusPong { payload } => buf.put_i64(*payload),
            ClientboundPacket::LoginDisconnect { reason }
            | ClientboundPacket::PlayDisconnect { reason } => wire::write_string(buf, reason),
            ClientboundPacket::EncryptionRequest {
                server_id,
                public_key,
                verify_token,
            } => {
                wire::write_string(buf, server_id);
                wire::write_byte_array(buf, public_key);
                wire::write_byte_array(buf, verify_token);
            }
            ClientboundPacket::LoginSuccess { uuid, username } => {
                wire::write_string(buf, uuid);
                wire::write_string(buf, username);
            }
            ClientboundPacket::SetCompression { threshold } => wire::write_var_i32(buf, *threshold),
            ClientboundPacket::KeepAlive { id } => wire::write_var_i32(buf, *id),
            ClientboundPacket::ChatMessage { json, position } => {
                wire::write_string(buf, json);
                buf.put_u8(*position);
            }
            ClientboundPacket::SpawnPosition { x, y, z } => buf.put_i64(pack_position(*x, *y, *z)),
            ClientboundPacket::ChunkData {
                chunk_x,
                chunk_z,
                ground_up,
                bitmask,
                data,
            } => {
                buf.put_i32(*chunk_x);
                buf.put_i32(*chunk_z);
                buf.put_u8(u8::from(*ground_up));
                buf.put_u16(*bitmask);
                wire::write_byte_array(buf, data);
            }
            ClientboundPacket::PluginMessage { channel, data } => {
                wire::write_string(buf, channel);
                buf.put_slice(data);
            }
        }
    }
}

#[derive(Serialize)]
struct ChatText<'a> {
    text: &'a str,
}

/// Wrap plain text as a JSON chat component.
pub fn chat_text(text: &str) -> String {
    serde_json::to_string(&ChatText { text }).unwrap_or_else(|_| String::from("{\"text\":\"\"}"))
}

/// Block position packed as 26 bits x, 12 bits y, 26 bits z.
pub fn pack_position(x: i32, y: i32, z: i32) -> i64 {
    ((x as i64 & 0x3FF_FFFF) << 38) | ((y as i64 & 0xFFF) << 26) | (z as i64 & 0x3FF_FFFF)
}

/// A block coordinate as carried by dig and place packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPosition {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPosition {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn pack(&self) -> i64 {
        pack_position(self.x, self.y, self.z)
    }

    /// Inverse of [`pack_position`], sign-extending each field.
    pub fn unpack(packed: i64) -> Self {
        Self {
            x: (packed >> 38) as i32,
            y: ((packed << 26) >> 52) as i32,
            z: ((packed << 38) >> 38) as i32,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn body_of(packet: &ClientboundPacket) -> Vec<u8> {
        let mut buf = BytesMut::new();
        packet.encode_body(&mut buf);
        buf.to_vec()
    }

    #[test]
    fn test_handshake_decode() {
        let mut buf = BytesMut::new();
        wire::write_var_i32(&mut buf, 47);
        wire::write_string(&mut buf, "localhost");
        buf.put_u16(25565);
        wire::write_var_i32(&mut buf, 2);
        let mut body = buf.freeze();

        let packet = decode_handshake(&mut body, &DecodeLimits::default()).unwrap();
        assert_eq!(
            packet,
            ServerboundPacket::Handshake {
                protocol_version: 47,
                server_address: "localhost".into(),
                server_port: 25565,
                next_state: 2,
            }
        );
        assert!(body.is_empty());
    }

    #[test]
    fn test_login_start_rejects_long_names() {
        let mut buf = BytesMut::new();
        wire::write_string(&mut buf, "seventeen_chars_x");
        let mut body = buf.freeze();
        assert!(decode_login_start(&mut body, &DecodeLimits::default()).is_err());
    }

    #[test]
    fn test_plugin_message_takes_rest_of_body() {
        let mut buf = BytesMut::new();
        wire::write_string(&mut buf, "MC|Brand");
        buf.put_slice(b"vanilla");
        let mut body = buf.freeze();

        let packet = decode_plugin_message(&mut body, &DecodeLimits::default()).unwrap();
        assert_eq!(
            packet,
            ServerboundPacket::PluginMessage {
                channel: "MC|Brand".into(),
                data: Bytes::from_static(b"vanilla"),
            }
        );
        assert!(body.is_empty());
    }

    #[test]
    fn test_truncated_position_rejected() {
        let mut body = Bytes::from_static(&[0u8; 12]);
        assert!(decode_player_position(&mut body, &DecodeLimits::default()).is_err());
    }

    #[test]
    fn test_encryption_request_layout() {
        let packet = ClientboundPacket::EncryptionRequest {
            server_id: String::new(),
            public_key: vec![0xAA; 3],
            verify_token: vec![1, 2, 3, 4],
        };
        assert_eq!(
            body_of(&packet),
            vec![0x00, 0x03, 0xAA, 0xAA, 0xAA, 0x04, 1, 2, 3, 4]
        );
    }

    #[test]
    fn test_disconnect_reason_is_json() {
        let packet = ClientboundPacket::login_disconnect("Failed to verify \"username\"");
        let ClientboundPacket::LoginDisconnect { reason } = packet else {
            panic!("wrong variant");
        };
        assert_eq!(reason, r#"{"text":"Failed to verify \"username\""}"#);
    }

    fn decode_with(decode: DecodeFn, body: &BytesMut) -> ServerboundPacket {
        let mut body = body.clone().freeze();
        let packet = decode(&mut body, &DecodeLimits::default()).unwrap();
        assert!(body.is_empty());
        packet
    }

    #[test]
    fn test_block_position_sign_extension() {
        for pos in [
            BlockPosition::new(0, 0, 0),
            BlockPosition::new(-1, 255, -1),
            BlockPosition::new(-33_554_432, 0, 33_554_431),
            BlockPosition::new(1200, 64, -860),
        ] {
            assert_eq!(BlockPosition::unpack(pos.pack()), pos);
        }
    }

    #[test]
    fn test_block_placement_splits_slot_and_cursor() {
        let mut buf = BytesMut::new();
        buf.put_i64(pack_position(10, 64, -3));
        buf.put_i8(1);
        // Stone, count 1, damage 0, no NBT
        buf.put_slice(&[0x00, 0x01, 0x01, 0x00, 0x00, 0x00]);
        buf.put_slice(&[8, 15, 4]);

        assert_eq!(
            decode_with(decode_block_placement, &buf),
            ServerboundPacket::BlockPlacement {
                location: BlockPosition::new(10, 64, -3),
                face: 1,
                held_item: Bytes::from_static(&[0x00, 0x01, 0x01, 0x00, 0x00, 0x00]),
                cursor: [8, 15, 4],
            }
        );
    }

    #[test]
    fn test_block_placement_needs_cursor() {
        let mut buf = BytesMut::new();
        buf.put_i64(0);
        buf.put_i8(1);
        buf.put_slice(&[0xFF, 0xFF]);
        let mut body = buf.freeze();
        assert!(decode_block_placement(&mut body, &DecodeLimits::default()).is_err());
    }

    #[test]
    fn test_client_settings_decode() {
        let mut buf = BytesMut::new();
        wire::write_string(&mut buf, "en_US");
        buf.put_slice(&[8, 0, 1, 0x7F]);

        assert_eq!(
            decode_with(decode_client_settings, &buf),
            ServerboundPacket::ClientSettings {
                locale: "en_US".into(),
                view_distance: 8,
                chat_mode: 0,
                chat_colors: true,
                skin_parts: 0x7F,
            }
        );
    }

    #[test]
    fn test_entity_action_decode() {
        let mut buf = BytesMut::new();
        wire::write_var_i32(&mut buf, 300);
        buf.put_u8(3);
        wire::write_var_i32(&mut buf, 0);

        assert_eq!(
            decode_with(decode_entity_action, &buf),
            ServerboundPacket::EntityAction {
                entity_id: 300,
                action: 3,
                jump_boost: 0,
            }
        );
    }

    #[test]
    fn test_position_packing() {
        assert_eq!(pack_position(0, 64, 0), 64 << 26);
        assert_eq!(pack_position(-1, 0, 0), 0x3FF_FFFF << 38);
        assert_eq!(pack_position(1, 2, 3), (1 << 38) | (2 << 26) | 3);
    }
}
