//! Classic protocol packet header definitions.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::buffer::MAX_U24;
use crate::error::ProtocolError;

/// Classic packet header size in bytes.
pub const PACKET_HEADER_SIZE: usize = 4;

/// Largest payload a single classic packet can carry (16 MiB - 1).
///
/// A payload of exactly this size is followed by another packet continuing
/// the same logical payload.
pub const MAX_PAYLOAD_LEN: usize = MAX_U24 as usize;

/// Classic protocol packet header.
///
/// Every classic packet begins with a 4-byte preamble: a 3-byte
/// little-endian payload length and a 1-byte sequence id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PacketHeader {
    /// Payload length, excluding the header.
    pub payload_length: u32,
    /// Sequence id (wraps at 255, restarts at 0 for each command).
    pub sequence_id: u8,
}

impl PacketHeader {
    /// Create a new packet header.
    ///
    /// Fails when the payload does not fit in three bytes.
    pub fn new(payload_length: usize, sequence_id: u8) -> Result<Self, ProtocolError> {
        if payload_length > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_length,
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(Self {
            payload_length: payload_length as u32,
            sequence_id,
        })
    }

    /// Parse a packet header from bytes.
    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        if src.remaining() < PACKET_HEADER_SIZE {
            return Err(ProtocolError::UnexpectedEof {
                needed: PACKET_HEADER_SIZE,
                available: src.remaining(),
            });
        }

        let payload_length = src.get_uint_le(3) as u32;
        let sequence_id = src.get_u8();

        Ok(Self {
            payload_length,
            sequence_id,
        })
    }

    /// Encode the packet header to bytes.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_uint_le(u64::from(self.payload_length & MAX_U24), 3);
        dst.put_u8(self.sequence_id);
    }

    /// Encode the packet header to a new `Bytes` buffer.
    #[must_use]
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(PACKET_HEADER_SIZE);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Payload length as a `usize`.
    #[must_use]
    pub const fn payload_len(&self) -> usize {
        self.payload_length as usize
    }

    /// Check if another packet continues this payload.
    #[must_use]
    pub const fn has_continuation(&self) -> bool {
        self.payload_len() == MAX_PAYLOAD_LEN
    }
}
