//! Message protocol frame header.
//!
//! A message frame is laid out as:
//!
//! ```text
//! +----------------+-----+------------------------+
//! | length: u32 LE | tag | body (length - 1 bytes) |
//! +----------------+-----+------------------------+
//! ```
//!
//! The length counts the tag byte and the body, never itself.

use bytes::{Buf, BufMut};

use crate::error::ProtocolError;

/// Size of the length field.
pub const FRAME_LENGTH_SIZE: usize = 4;

/// Size of the full frame header (length + tag).
pub const FRAME_HEADER_SIZE: usize = FRAME_LENGTH_SIZE + 1;

/// Message frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHeader {
    /// Length of tag plus body.
    pub length: u32,
    /// Message type tag.
    pub tag: u8,
}

impl FrameHeader {
    /// Build the header for a body of `body_len` bytes.
    pub fn for_body(tag: u8, body_len: usize) -> Result<Self, ProtocolError> {
        let length = u32::try_from(body_len)
            .ok()
            .and_then(|len| len.checked_add(1))
            .ok_or(ProtocolError::FrameTooLarge {
                size: body_len.saturating_add(1),
                max: u32::MAX as usize,
            })?;
        Ok(Self { length, tag })
    }

    /// Read just the length field, validating it against `max_frame_size`.
    ///
    /// Returns the body length (the length minus the tag byte).
    pub fn decode_length(src: &mut impl Buf, max_frame_size: usize) -> Result<usize, ProtocolError> {
        if src.remaining() < FRAME_LENGTH_SIZE {
            return Err(ProtocolError::UnexpectedEof {
                needed: FRAME_LENGTH_SIZE,
                available: src.remaining(),
            });
        }
        let length = src.get_u32_le();
        Self::check_length(length, max_frame_size)
    }

    /// Parse a frame header, validating the length against `max_frame_size`.
    pub fn decode(src: &mut impl Buf, max_frame_size: usize) -> Result<Self, ProtocolError> {
        if src.remaining() < FRAME_HEADER_SIZE {
            return Err(ProtocolError::UnexpectedEof {
                needed: FRAME_HEADER_SIZE,
                available: src.remaining(),
            });
        }
        let length = src.get_u32_le();
        Self::check_length(length, max_frame_size)?;
        let tag = src.get_u8();
        Ok(Self { length, tag })
    }

    fn check_length(length: u32, max_frame_size: usize) -> Result<usize, ProtocolError> {
        if length == 0 {
            return Err(ProtocolError::InvalidFrameLength(length));
        }
        let size = length as usize;
        if size > max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size,
                max: max_frame_size,
            });
        }
        Ok(size - 1)
    }

    /// Encode the frame header.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u32_le(self.length);
        dst.put_u8(self.tag);
    }

    /// Length of the body following the header.
    #[must_use]
    pub const fn body_len(&self) -> usize {
        self.length.saturating_sub(1) as usize
    }
}
