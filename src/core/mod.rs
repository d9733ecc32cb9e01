//! # Core Protocol Components
//!
//! Low-level framing, codecs, and primitive wire types.
//!
//! This module provides the foundation for the protocol, handling frame
//! reassembly, the optional compression and cipher stages, and the varint
//! encoding used by every packet.
//!
//! ## Components
//! - **Wire**: varints, bounded strings and byte arrays, fixed-width numerics
//! - **Packet**: a raw `(id, body)` pair extracted from one frame
//! - **Codec**: Tokio codec for framing over byte streams
//!
//! ## Wire Format
//! ```text
//! uncompressed:  [VarInt len] [VarInt id] [body]
//! compressed:    [VarInt len] [VarInt data_len] [zlib([VarInt id] [body]) | raw if data_len == 0]
//! ```
//! Once encryption is enabled every byte above passes through AES-CFB8.
//!
//! ## Security
//! - Maximum frame length: 2 097 151 bytes (3-byte varint)
//! - Maximum uncompressed length: 8 MiB
//! - Length validation before allocation

pub mod codec;
pub mod packet;
pub mod wire;
