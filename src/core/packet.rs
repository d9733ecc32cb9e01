use bytes::{BufMut, Bytes, BytesMut};

use crate::core::wire;

/// A packet as it sits inside one frame: the numeric id and the still-encoded
/// body. The registry turns it into a typed packet for the current stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub id: i32,
    pub body: Bytes,
}

impl RawPacket {
    pub fn new(id: i32, body: impl Into<Bytes>) -> Self {
        Self {
            id,
            body: body.into(),
        }
    }

    /// Length of `varint(id) || body`.
    pub fn payload_len(&self) -> usize {
        wire::varint_len(self.id as u32) + self.body.len()
    }

    /// Serialize as `varint(id) || body`.
    pub fn to_payload(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(self.payload_len());
        wire::write_var_i32(&mut out, self.id);
        out.put_slice(&self.body);
        out
    }
}
