//! Frame pipeline as a tokio-util codec.
//!
//! Inbound order: decrypt stream bytes, parse the frame, decompress the
//! payload, split off the packet id. Outbound is the mirror image: prefix the
//! id, optionally compress, prefix lengths, encrypt.
//!
//! The cipher works on the raw stream, not on frames. Inbound bytes are
//! decrypted in place exactly once as they arrive in the read buffer; a
//! watermark tracks how much of the buffer is already plaintext so that a
//! partial frame can be re-parsed on the next call without decrypting twice.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::packet::RawPacket;
use crate::core::wire;
use crate::error::{constants, ProtocolError, Result};
use crate::utils::compression::{self, DEFAULT_COMPRESSION_LEVEL, MAX_UNCOMPRESSED_LENGTH};
use crate::utils::crypto::{SharedSecret, StreamCipher};

/// Largest frame length expressible in a 3-byte varint.
pub const MAX_FRAME_LENGTH: usize = 2_097_151;

/// Stream transform: either plaintext or ciphered. The only transition is
/// `Plain -> Ciphered`.
enum CipherState {
    Plain,
    Ciphered(Box<StreamCipher>),
}

#[derive(Debug, Clone, Copy)]
struct CompressionSettings {
    threshold: usize,
    level: u32,
}

pub struct FrameCodec {
    max_frame_length: usize,
    max_uncompressed_length: usize,
    compression: Option<CompressionSettings>,
    cipher: CipherState,
    /// Prefix of the read buffer that has already been decrypted.
    decrypted: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_limits(MAX_FRAME_LENGTH, MAX_UNCOMPRESSED_LENGTH)
    }

    pub fn with_limits(max_frame_length: usize, max_uncompressed_length: usize) -> Self {
        Self {
            max_frame_length: max_frame_length.min(MAX_FRAME_LENGTH),
            max_uncompressed_length,
            compression: None,
            cipher: CipherState::Plain,
            decrypted: 0,
        }
    }

    /// Switch both directions to AES-CFB8 keyed by `secret`.
    ///
    /// Bytes already sitting in the read buffer past the current frame are
    /// treated as ciphertext.
    ///
    /// # Errors
    /// `HandshakeViolation` if the cipher is already on, `CipherFault` if the
    /// key material is rejected.
    pub fn enable_encryption(&mut self, secret: &SharedSecret) -> Result<()> {
        if self.is_encrypted() {
            return Err(ProtocolError::violation(
                constants::ERR_ENCRYPTION_ALREADY_ENABLED,
            ));
        }
        self.cipher = CipherState::Ciphered(Box::new(StreamCipher::new(secret)?));
        self.decrypted = 0;
        Ok(())
    }

    /// Switch to the compressed frame layout. Payloads of at least
    /// `threshold` bytes are deflated.
    pub fn enable_compression(&mut self, threshold: usize) -> Result<()> {
        self.enable_compression_with_level(threshold, DEFAULT_COMPRESSION_LEVEL)
    }

    pub fn enable_compression_with_level(&mut self, threshold: usize, level: u32) -> Result<()> {
        if self.compression.is_some() {
            return Err(ProtocolError::violation(
                constants::ERR_COMPRESSION_ALREADY_ENABLED,
            ));
        }
        self.compression = Some(CompressionSettings { threshold, level });
        Ok(())
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self.cipher, CipherState::Ciphered(_))
    }

    pub fn compression_threshold(&self) -> Option<usize> {
        self.compression.map(|c| c.threshold)
    }

    fn decrypt_new_bytes(&mut self, src: &mut BytesMut) {
        if let CipherState::Ciphered(cipher) = &mut self.cipher {
            if self.decrypted < src.len() {
                cipher.decrypt(&mut src[self.decrypted..]);
                self.decrypted = src.len();
            }
        }
    }

    fn unwrap_payload(&self, mut payload: Bytes) -> Result<Bytes> {
        let Some(settings) = self.compression else {
            return Ok(payload);
        };

        let declared = wire::read_length(&mut payload, self.max_uncompressed_length)?;
        if declared == 0 {
            return Ok(payload);
        }
        if declared < settings.threshold {
            return Err(ProtocolError::MalformedFrame(format!(
                "Compressed payload of {declared} bytes is below threshold {}",
                settings.threshold
            )));
        }
        let inflated = compression::decompress(&payload, declared, self.max_uncompressed_length)?;
        Ok(Bytes::from(inflated))
    }
}

impl Decoder for FrameCodec {
    type Item = RawPacket;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.decrypt_new_bytes(src);

        let Some((length, header_len)) = wire::peek_varint(&src[..])? else {
            return Ok(None);
        };
        let length = length as i32;
        if length <= 0 {
            return Err(ProtocolError::MalformedFrame(format!(
                "Invalid frame length {length}"
            )));
        }
        let length = length as usize;
        if length > self.max_frame_length {
            return Err(ProtocolError::MalformedFrame(format!(
                "Frame of {length} bytes exceeds limit {}",
                self.max_frame_length
            )));
        }

        let total = header_len + length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(header_len);
        let payload = src.split_to(length).freeze();
        if self.is_encrypted() {
            self.decrypted -= total;
        }

        let mut body = self.unwrap_payload(payload)?;
        let id = wire::read_var_i32(&mut body)?;
        Ok(Some(RawPacket { id, body }))
    }
}

impl Encoder<RawPacket> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: RawPacket, dst: &mut BytesMut) -> Result<()> {
        let payload = item.to_payload();
        let start = dst.len();

        match self.compression {
            Some(settings) => {
                match compression::maybe_compress(&payload, settings.threshold, settings.level)? {
                    Some(compressed) => {
                        self.put_compressed_frame(dst, payload.len() as u32, &compressed)?
                    }
                    // Zero marks a payload sent as-is
                    None => self.put_compressed_frame(dst, 0, &payload)?,
                }
            }
            None => {
                self.check_outbound(payload.len())?;
                dst.reserve(wire::varint_len(payload.len() as u32) + payload.len());
                wire::write_varint(dst, payload.len() as u32);
                dst.put_slice(&payload);
            }
        }

        if let CipherState::Ciphered(cipher) = &mut self.cipher {
            cipher.encrypt(&mut dst[start..]);
        }
        Ok(())
    }
}

impl FrameCodec {
    /// Write `data_len` then `body` under one length prefix.
    fn put_compressed_frame(&self, dst: &mut BytesMut, data_len: u32, body: &[u8]) -> Result<()> {
        let frame_len = wire::varint_len(data_len) + body.len();
        self.check_outbound(frame_len)?;
        dst.reserve(wire::varint_len(frame_len as u32) + frame_len);
        wire::write_varint(dst, frame_len as u32);
        wire::write_varint(dst, data_len);
        dst.put_slice(body);
        Ok(())
    }

    fn check_outbound(&self, frame_len: usize) -> Result<()> {
        if frame_len > self.max_frame_length {
            return Err(ProtocolError::MalformedFrame(format!(
                "Outbound frame of {frame_len} bytes exceeds limit {}",
                self.max_frame_length
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_one(codec: &mut FrameCodec, packet: RawPacket) -> BytesMut {
        let mut buf = BytesMut::new();
        codec.encode(packet, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_plain_frame_layout() {
        let mut codec = FrameCodec::new();
        let buf = encode_one(&mut codec, RawPacket::new(0x02, vec![0xAA, 0xBB]));
        assert_eq!(&buf[..], &[0x03, 0x02, 0xAA, 0xBB]);
    }

    #[test]
    fn test_partial_frame_preserves_buffer() {
        let mut codec = FrameCodec::new();
        let full = encode_one(&mut FrameCodec::new(), RawPacket::new(1, vec![9u8; 300]));

        // Length prefix split across reads
        let mut buffer = BytesMut::from(&full[..1]);
        assert!(codec.decode(&mut buffer).unwrap().is_none());
        assert_eq!(buffer.len(), 1);

        // Header complete, body partial
        let mut buffer = BytesMut::from(&full[..100]);
        assert!(codec.decode(&mut buffer).unwrap().is_none());
        assert_eq!(&buffer[..], &full[..100]);

        buffer.extend_from_slice(&full[100..]);
        let packet = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(packet.id, 1);
        assert_eq!(packet.body.len(), 300);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_read() {
        let mut writer = FrameCodec::new();
        let mut buffer = BytesMut::new();
        writer.encode(RawPacket::new(0, vec![1, 2, 3]), &mut buffer).unwrap();
        writer.encode(RawPacket::new(5, vec![4, 5]), &mut buffer).unwrap();

        let mut reader = FrameCodec::new();
        let first = reader.decode(&mut buffer).unwrap().unwrap();
        let second = reader.decode(&mut buffer).unwrap().unwrap();
        assert_eq!((first.id, &first.body[..]), (0, &[1u8, 2, 3][..]));
        assert_eq!((second.id, &second.body[..]), (5, &[4u8, 5][..]));
        assert!(reader.decode(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn test_zero_and_oversized_lengths_rejected() {
        let mut codec = FrameCodec::new();
        let mut empty = BytesMut::from(&[0x00][..]);
        assert!(matches!(
            codec.decode(&mut empty),
            Err(ProtocolError::MalformedFrame(_))
        ));

        let mut huge = BytesMut::new();
        wire::write_varint(&mut huge, (MAX_FRAME_LENGTH + 1) as u32);
        assert!(matches!(
            codec.decode(&mut huge),
            Err(ProtocolError::MalformedFrame(_))
        ));

        let mut runaway = BytesMut::from(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01][..]);
        assert!(codec.decode(&mut runaway).is_err());
    }

    #[test]
    fn test_compression_threshold_boundary() {
        let threshold = 64;
        let mut codec = FrameCodec::new();
        codec.enable_compression(threshold).unwrap();

        // id 0x10 is one byte, so a body of threshold - 2 gives a payload of threshold - 1
        let below = encode_one(&mut codec, RawPacket::new(0x10, vec![7u8; threshold - 2]));
        let (frame_len, header) = wire::peek_varint(&below).unwrap().unwrap();
        assert_eq!(frame_len as usize, threshold);
        assert_eq!(below[header], 0x00, "below threshold carries the raw marker");

        let at = encode_one(&mut codec, RawPacket::new(0x10, vec![7u8; threshold - 1]));
        let (_, header) = wire::peek_varint(&at).unwrap().unwrap();
        let (data_len, _) = wire::peek_varint(&at[header..]).unwrap().unwrap();
        assert_eq!(data_len as usize, threshold, "at threshold is compressed");

        let mut reader = FrameCodec::new();
        reader.enable_compression(threshold).unwrap();
        let mut stream = BytesMut::new();
        stream.extend_from_slice(&below);
        stream.extend_from_slice(&at);
        let a = reader.decode(&mut stream).unwrap().unwrap();
        let b = reader.decode(&mut stream).unwrap().unwrap();
        assert_eq!(a.body.len(), threshold - 2);
        assert_eq!(b.body.len(), threshold - 1);
        assert_eq!(b.body, Bytes::from(vec![7u8; threshold - 1]));
    }

    #[test]
    fn test_compression_mismatch_detected() {
        let payload = RawPacket::new(1, vec![0u8; 200]).to_payload();
        let compressed = compression::compress(&payload, 6).unwrap();

        let mut frame = BytesMut::new();
        let lie = payload.len() as u32 + 5;
        wire::write_varint(&mut frame, (wire::varint_len(lie) + compressed.len()) as u32);
        wire::write_varint(&mut frame, lie);
        frame.put_slice(&compressed);

        let mut codec = FrameCodec::new();
        codec.enable_compression(64).unwrap();
        assert!(matches!(
            codec.decode(&mut frame),
            Err(ProtocolError::CompressionMismatch { .. })
        ));
    }

    #[test]
    fn test_compression_enabled_once() {
        let mut codec = FrameCodec::new();
        codec.enable_compression(256).unwrap();
        assert!(matches!(
            codec.enable_compression(512),
            Err(ProtocolError::HandshakeViolation(_))
        ));
        assert_eq!(codec.compression_threshold(), Some(256));
    }

    #[test]
    fn test_cipher_enabled_mid_buffer() {
        let secret = SharedSecret::from_slice(&[0x5A; 16]).unwrap();

        // Client writes one plaintext frame, then switches on its cipher
        let mut client = FrameCodec::new();
        let mut wire_bytes = BytesMut::new();
        client.encode(RawPacket::new(1, vec![0xEE; 8]), &mut wire_bytes).unwrap();
        client.enable_encryption(&secret).unwrap();
        client.encode(RawPacket::new(2, vec![0x11; 40]), &mut wire_bytes).unwrap();
        client.encode(RawPacket::new(3, vec![0x22; 3]), &mut wire_bytes).unwrap();

        // Server receives everything in a single read
        let mut server = FrameCodec::new();
        let first = server.decode(&mut wire_bytes).unwrap().unwrap();
        assert_eq!(first.id, 1);
        server.enable_encryption(&secret).unwrap();

        // Feed the ciphered remainder back in two pieces
        let tail = wire_bytes.split_off(10);
        let second_partial = server.decode(&mut wire_bytes).unwrap();
        assert!(second_partial.is_none());
        wire_bytes.unsplit(tail);

        let second = server.decode(&mut wire_bytes).unwrap().unwrap();
        let third = server.decode(&mut wire_bytes).unwrap().unwrap();
        assert_eq!((second.id, second.body.len()), (2, 40));
        assert_eq!((third.id, &third.body[..]), (3, &[0x22u8; 3][..]));
        assert!(wire_bytes.is_empty());
    }

    #[test]
    fn test_encryption_enabled_once() {
        let secret = SharedSecret::from_slice(&[1; 16]).unwrap();
        let mut codec = FrameCodec::new();
        codec.enable_encryption(&secret).unwrap();
        assert!(codec.enable_encryption(&secret).is_err());
        assert!(codec.is_encrypted());
    }

    #[test]
    fn test_outbound_frame_limit() {
        let mut codec = FrameCodec::with_limits(16, MAX_UNCOMPRESSED_LENGTH);
        let mut buf = BytesMut::new();
        assert!(codec.encode(RawPacket::new(0, vec![0; 32]), &mut buf).is_err());
        assert!(buf.is_empty());
    }
}
