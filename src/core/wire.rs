//! Primitive wire types shared by every packet.
//!
//! Variable-length integers carry 7 data bits per byte, least significant
//! group first, with the high bit set on every byte except the last. A
//! 32-bit value never needs more than [`MAX_VARINT_LEN`] bytes; anything
//! longer is rejected as a malformed frame before more input is consumed.
//!
//! Strings and byte arrays are `varint(length) || bytes`. Declared lengths
//! are checked against a caller-supplied maximum before anything is
//! allocated.

use bytes::{Buf, BufMut};

use crate::error::{constants, ProtocolError, Result};

/// Maximum encoded width of a varint.
pub const MAX_VARINT_LEN: usize = 5;

/// Default maximum string length in characters.
pub const MAX_STRING_LENGTH: usize = 32_767;

/// Number of bytes `value` occupies once encoded.
#[inline]
pub fn varint_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

/// Append `value` as a varint.
#[inline]
pub fn write_varint<B: BufMut>(buf: &mut B, mut value: u32) {
    loop {
        if value & !0x7F == 0 {
            buf.put_u8(value as u8);
            return;
        }
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
}

/// Consume a varint from `buf`.
///
/// # Errors
/// `MalformedFrame` if the input ends mid-varint or the encoding runs past
/// five bytes.
pub fn read_varint<B: Buf>(buf: &mut B) -> Result<u32> {
    let mut value: u32 = 0;
    for i in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(ProtocolError::malformed(constants::ERR_TRUNCATED));
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(ProtocolError::malformed(constants::ERR_VARINT_TOO_LONG))
}

/// Read a varint from the front of `bytes` without consuming anything.
///
/// Returns `Ok(None)` when the slice ends before the varint terminates, so
/// a partial frame leaves the stream position untouched. Returns the value
/// and its encoded width otherwise.
pub fn peek_varint(bytes: &[u8]) -> Result<Option<(u32, usize)>> {
    let mut value: u32 = 0;
    for i in 0..MAX_VARINT_LEN {
        let Some(&byte) = bytes.get(i) else {
            return Ok(None);
        };
        value |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }
    Err(ProtocolError::malformed(constants::ERR_VARINT_TOO_LONG))
}

/// Signed view of [`write_varint`]; negative values take five bytes.
#[inline]
pub fn write_var_i32<B: BufMut>(buf: &mut B, value: i32) {
    write_varint(buf, value as u32)
}

/// Signed view of [`read_varint`].
#[inline]
pub fn read_var_i32<B: Buf>(buf: &mut B) -> Result<i32> {
    read_varint(buf).map(|v| v as i32)
}

/// Read a length prefix, rejecting negative and oversized declarations.
pub fn read_length<B: Buf>(buf: &mut B, max: usize) -> Result<usize> {
    let declared = read_var_i32(buf)?;
    if declared < 0 {
        return Err(ProtocolError::malformed(constants::ERR_NEGATIVE_LENGTH));
    }
    let declared = declared as usize;
    if declared > max {
        return Err(ProtocolError::MalformedFrame(format!(
            "Declared length {declared} exceeds limit {max}"
        )));
    }
    Ok(declared)
}

/// Read a length-prefixed UTF-8 string of at most `max_chars` characters.
pub fn read_string<B: Buf>(buf: &mut B, max_chars: usize) -> Result<String> {
    // UTF-8 needs at most 4 bytes per char
    let len = read_length(buf, max_chars.saturating_mul(4))?;
    ensure_remaining(buf, len)?;
    let mut raw = vec![0u8; len];
    buf.copy_to_slice(&mut raw);
    let s = String::from_utf8(raw).map_err(|_| ProtocolError::malformed(constants::ERR_INVALID_UTF8))?;
    if s.chars().count() > max_chars {
        return Err(ProtocolError::MalformedFrame(format!(
            "String of {} chars exceeds limit {max_chars}",
            s.chars().count()
        )));
    }
    Ok(s)
}

pub fn write_string<B: BufMut>(buf: &mut B, value: &str) {
    write_byte_array(buf, value.as_bytes());
}

/// Read a length-prefixed byte array of at most `max_len` bytes.
pub fn read_byte_array<B: Buf>(buf: &mut B, max_len: usize) -> Result<Vec<u8>> {
    let len = read_length(buf, max_len)?;
    ensure_remaining(buf, len)?;
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

pub fn write_byte_array<B: BufMut>(buf: &mut B, value: &[u8]) {
    write_varint(buf, value.len() as u32);
    buf.put_slice(value);
}

/// Fail with `MalformedFrame` unless `buf` holds at least `n` more bytes.
#[inline]
pub fn ensure_remaining<B: Buf>(buf: &B, n: usize) -> Result<()> {
    if buf.remaining() < n {
        return Err(ProtocolError::malformed(constants::ERR_TRUNCATED));
    }
    Ok(())
}

pub fn read_bool<B: Buf>(buf: &mut B) -> Result<bool> {
    ensure_remaining(buf, 1)?;
    Ok(buf.get_u8() != 0)
}

pub fn read_u8<B: Buf>(buf: &mut B) -> Result<u8> {
    ensure_remaining(buf, 1)?;
    Ok(buf.get_u8())
}

pub fn read_i8<B: Buf>(buf: &mut B) -> Result<i8> {
    ensure_remaining(buf, 1)?;
    Ok(buf.get_i8())
}

pub fn read_i16<B: Buf>(buf: &mut B) -> Result<i16> {
    ensure_remaining(buf, 2)?;
    Ok(buf.get_i16())
}

pub fn read_u16<B: Buf>(buf: &mut B) -> Result<u16> {
    ensure_remaining(buf, 2)?;
    Ok(buf.get_u16())
}

pub fn read_i64<B: Buf>(buf: &mut B) -> Result<i64> {
    ensure_remaining(buf, 8)?;
    Ok(buf.get_i64())
}

pub fn read_f32<B: Buf>(buf: &mut B) -> Result<f32> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_f32())
}

pub fn read_f64<B: Buf>(buf: &mut B) -> Result<f64> {
    ensure_remaining(buf, 8)?;
    Ok(buf.get_f64())
}
