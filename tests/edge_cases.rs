#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests for framing, packet decoding and session state
//! Boundary conditions, malformed input and resource limits

use bytes::{BufMut, BytesMut};
use gateway_protocol::core::codec::{FrameCodec, MAX_FRAME_LENGTH};
use gateway_protocol::core::packet::RawPacket;
use gateway_protocol::core::wire;
use gateway_protocol::error::ProtocolError;
use gateway_protocol::network::session::ClientSession;
use gateway_protocol::protocol::packets::{ClientboundPacket, ServerboundPacket};
use gateway_protocol::protocol::registry::PacketRegistry;
use gateway_protocol::protocol::{Direction, Stage};
use gateway_protocol::utils::compression::compress;
use gateway_protocol::utils::crypto::SharedSecret;
use tokio_util::codec::{Decoder, Encoder};

// ============================================================================
// FRAMING EDGE CASES
// ============================================================================

#[test]
fn test_empty_buffer_needs_more() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();
    assert!(codec.decode(&mut buf).unwrap().is_none());
}

#[test]
fn test_byte_at_a_time_delivery() {
    let mut encoder = FrameCodec::new();
    let mut wire_bytes = BytesMut::new();
    encoder
        .encode(RawPacket::new(0x17, vec![1, 2, 3, 4, 5]), &mut wire_bytes)
        .unwrap();

    let mut decoder = FrameCodec::new();
    let mut inbound = BytesMut::new();
    let mut decoded = None;
    for byte in wire_bytes.iter() {
        assert!(decoded.is_none(), "frame completed early");
        inbound.put_u8(*byte);
        decoded = decoder.decode(&mut inbound).unwrap();
    }
    let packet = decoded.expect("frame never completed");
    assert_eq!(packet.id, 0x17);
    assert_eq!(&packet.body[..], &[1, 2, 3, 4, 5]);
    assert!(inbound.is_empty());
}

#[test]
fn test_zero_length_frame_rejected() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from(&[0x00][..]);
    assert!(matches!(
        codec.decode(&mut buf),
        Err(ProtocolError::MalformedFrame(_))
    ));
}

#[test]
fn test_frame_over_limit_rejected_before_body_arrives() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();
    wire::write_varint(&mut buf, (MAX_FRAME_LENGTH + 1) as u32);
    assert!(matches!(
        codec.decode(&mut buf),
        Err(ProtocolError::MalformedFrame(_))
    ));
}

#[test]
fn test_configured_limit_is_enforced() {
    let mut codec = FrameCodec::with_limits(1024, 4096);
    let mut buf = BytesMut::new();
    wire::write_varint(&mut buf, 1025);
    assert!(codec.decode(&mut buf).is_err());
}

#[test]
fn test_six_byte_length_prefix_rejected() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01][..]);
    assert!(matches!(
        codec.decode(&mut buf),
        Err(ProtocolError::MalformedFrame(_))
    ));
}

#[test]
fn test_declared_uncompressed_length_over_limit() {
    let mut codec = FrameCodec::with_limits(MAX_FRAME_LENGTH, 1024);
    codec.enable_compression(64).unwrap();

    let payload = vec![0u8; 2048];
    let compressed = compress(&payload, 6).unwrap();
    let mut inner = BytesMut::new();
    wire::write_varint(&mut inner, payload.len() as u32);
    inner.put_slice(&compressed);
    let mut frame = BytesMut::new();
    wire::write_varint(&mut frame, inner.len() as u32);
    frame.put_slice(&inner);

    assert!(matches!(
        codec.decode(&mut frame),
        Err(ProtocolError::MalformedFrame(_))
    ));
}

#[test]
fn test_corrupt_zlib_stream() {
    let mut codec = FrameCodec::new();
    codec.enable_compression(16).unwrap();

    let mut inner = BytesMut::new();
    wire::write_varint(&mut inner, 100);
    inner.put_slice(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x11]);
    let mut frame = BytesMut::new();
    wire::write_varint(&mut frame, inner.len() as u32);
    frame.put_slice(&inner);

    assert!(matches!(
        codec.decode(&mut frame),
        Err(ProtocolError::DecompressionFailure)
    ));
}

#[test]
fn test_wrong_key_yields_garbage_not_panic() {
    let mut sender = FrameCodec::new();
    sender
        .enable_encryption(&SharedSecret::from_slice(&[1; 16]).unwrap())
        .unwrap();
    let mut receiver = FrameCodec::new();
    receiver
        .enable_encryption(&SharedSecret::from_slice(&[2; 16]).unwrap())
        .unwrap();

    let mut buf = BytesMut::new();
    sender
        .encode(RawPacket::new(0x01, vec![0x33; 64]), &mut buf)
        .unwrap();
    // Either a decode error or a frame that never completes; never a panic
    let _ = receiver.decode(&mut buf);
}

// ============================================================================
// PACKET DECODING EDGE CASES
// ============================================================================

#[test]
fn test_unknown_id_in_each_stage() {
    let registry = PacketRegistry::global();
    for stage in [Stage::Handshake, Stage::Status, Stage::Login, Stage::Play] {
        let result = registry.decode(stage, RawPacket::new(0x7F, Vec::new()));
        assert!(
            matches!(result, Err(ProtocolError::UnknownPacketId { stage: s, .. }) if s == stage),
            "stage {stage:?}"
        );
    }
}

#[test]
fn test_login_start_username_too_long() {
    let mut body = BytesMut::new();
    wire::write_string(&mut body, "abcdefghijklmnopq");
    let result = PacketRegistry::global().decode(Stage::Login, RawPacket::new(0x00, body.freeze()));
    assert!(matches!(result, Err(ProtocolError::MalformedFrame(_))));
}

#[test]
fn test_truncated_status_ping() {
    let result = PacketRegistry::global().decode(Stage::Status, RawPacket::new(0x01, vec![0, 0, 0]));
    assert!(matches!(result, Err(ProtocolError::MalformedFrame(_))));
}

#[test]
fn test_negative_byte_array_length() {
    let mut body = BytesMut::new();
    wire::write_var_i32(&mut body, -1);
    let result = PacketRegistry::global().decode(Stage::Login, RawPacket::new(0x01, body.freeze()));
    assert!(matches!(result, Err(ProtocolError::MalformedFrame(_))));
}

#[test]
fn test_handshake_roundtrip_through_registry() {
    let registry = PacketRegistry::global();
    let packet = ServerboundPacket::Handshake {
        protocol_version: 47,
        server_address: "play.example.net".into(),
        server_port: 25565,
        next_state: 2,
    };
    let raw = registry.encode_serverbound(Stage::Handshake, &packet).unwrap();
    assert_eq!(raw.id, 0x00);
    assert_eq!(registry.decode(Stage::Handshake, raw).unwrap(), packet);
}

#[test]
fn test_clientbound_ids_are_not_decodable() {
    let registry = PacketRegistry::global();
    let set_compression = ClientboundPacket::SetCompression { threshold: 256 };
    assert_eq!(registry.encode(Stage::Login, &set_compression).unwrap().id, 0x03);
    assert!(matches!(
        registry.decode(Stage::Login, RawPacket::new(0x03, vec![0x00])),
        Err(ProtocolError::UnknownPacketId {
            direction: Direction::Serverbound,
            id: 0x03,
            ..
        })
    ));
}

// ============================================================================
// SESSION STATE EDGE CASES
// ============================================================================

fn session() -> ClientSession {
    ClientSession::new("127.0.0.1:1".parse().unwrap())
}

#[test]
fn test_stage_never_moves_backwards() {
    let s = session();
    s.advance_stage(Stage::Login).unwrap();
    s.advance_stage(Stage::Play).unwrap();
    assert!(s.advance_stage(Stage::Login).is_err());
    assert!(s.advance_stage(Stage::Handshake).is_err());
    assert_eq!(s.stage(), Stage::Play);
}

#[test]
fn test_status_cannot_reach_play() {
    let s = session();
    s.advance_stage(Stage::Status).unwrap();
    assert!(s.advance_stage(Stage::Login).is_err());
    assert!(s.advance_stage(Stage::Play).is_err());
}

#[test]
fn test_encryption_requires_secret() {
    let s = session();
    assert!(s.enable_encryption().is_err());
    s.install_secret(SharedSecret::from_slice(&[5; 16]).unwrap())
        .unwrap();
    assert!(s.enable_encryption().is_ok());
    assert!(s.enable_encryption().is_err());
}

#[test]
fn test_compression_only_during_login() {
    let s = session();
    assert!(s.enable_compression(256).is_err());
    s.advance_stage(Stage::Login).unwrap();
    s.enable_compression(256).unwrap();
    assert!(s.enable_compression(512).is_err());
    assert_eq!(s.compression_threshold(), Some(256));
}

#[test]
fn test_shared_secret_wrong_length() {
    assert!(SharedSecret::from_slice(&[0; 15]).is_err());
    assert!(SharedSecret::from_slice(&[0; 17]).is_err());
}
