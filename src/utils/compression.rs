use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use std::io::Read;

use crate::error::{ProtocolError, Result};

/// Largest uncompressed payload a peer may declare (8 MiB).
pub const MAX_UNCOMPRESSED_LENGTH: usize = 8 * 1024 * 1024;

/// Default zlib level for outbound frames.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Compresses data with zlib at the given level (0-9)
///
/// # Errors
/// Returns `ProtocolError::CompressionFailure` if compression fails
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(data, Compression::new(level.min(9)));
    let mut out = Vec::with_capacity(data.len() / 2);
    encoder
        .read_to_end(&mut out)
        .map_err(|_| ProtocolError::CompressionFailure)?;
    Ok(out)
}

/// Decompresses a zlib payload that the peer declared to be `declared` bytes.
///
/// The declaration is checked against `limit` before any output is
/// allocated, and the decoder never produces more than one byte past the
/// declaration, so a decompression bomb cannot exhaust memory.
///
/// # Errors
/// - `MalformedFrame` if `declared` exceeds `limit`
/// - `DecompressionFailure` if the zlib stream is corrupt
/// - `CompressionMismatch` if the output length differs from `declared`
pub fn decompress(data: &[u8], declared: usize, limit: usize) -> Result<Vec<u8>> {
    if declared > limit {
        return Err(ProtocolError::MalformedFrame(format!(
            "Declared uncompressed length {declared} exceeds limit {limit}"
        )));
    }

    let mut out = Vec::with_capacity(declared);
    ZlibDecoder::new(data)
        .take(declared as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|_| ProtocolError::DecompressionFailure)?;

    if out.len() != declared {
        return Err(ProtocolError::CompressionMismatch {
            declared,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Compress `data` when it is at least `threshold` bytes.
///
/// Returns `None` for payloads below the threshold, which go on the wire
/// uncompressed.
pub fn maybe_compress(data: &[u8], threshold: usize, level: u32) -> Result<Option<Vec<u8>>> {
    if data.len() < threshold {
        return Ok(None);
    }
    compress(data, level).map(Some)
}
