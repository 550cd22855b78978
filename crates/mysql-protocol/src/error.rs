//! Protocol-level error types.

use thiserror::Error;

/// Errors raised while encoding or decoding wire data.
///
/// Most variants indicate that the bytes handed to a decoder do not agree
/// with their framing (a length prefix pointing past the end of a packet,
/// a cursor moved outside the logical length). Those are upstream framing
/// bugs and are reported by [`ProtocolError::is_framing_bug`]. The only
/// configuration-class failure is [`ProtocolError::UnsupportedEncoding`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// A read needed more bytes than remain before the logical length.
    #[error("unexpected end of data: need {needed} bytes, have {available}")]
    UnexpectedEof {
        /// Bytes needed by the read.
        needed: usize,
        /// Bytes remaining after the cursor.
        available: usize,
    },

    /// The cursor or logical length was moved outside the valid range.
    #[error("cursor {position} out of range for length {len}")]
    CursorOutOfRange {
        /// Requested position.
        position: usize,
        /// Upper bound that was violated.
        len: usize,
    },

    /// A length-encoded integer started with a byte that has no meaning.
    #[error("invalid length-encoded integer prefix 0x{0:02X}")]
    InvalidLengthPrefix(u8),

    /// A character encoding name was not recognized.
    #[error("unsupported character encoding: {0}")]
    UnsupportedEncoding(String),

    /// String bytes were not valid in the requested encoding.
    #[error("malformed string data for encoding {encoding}")]
    MalformedString {
        /// Name of the encoding used to decode.
        encoding: &'static str,
    },

    /// An inbound message carried a tag with no registered message type.
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    /// A message frame declared a length that cannot hold a type tag.
    #[error("invalid frame length {0}")]
    InvalidFrameLength(u32),

    /// A message frame exceeded the configured size limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Declared frame size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A classic packet arrived with an unexpected sequence id.
    #[error("packet out of order: expected sequence {expected}, got {actual}")]
    PacketOutOfOrder {
        /// Sequence id the reader expected.
        expected: u8,
        /// Sequence id found on the wire.
        actual: u8,
    },

    /// A classic packet payload does not fit in the 3-byte length field.
    #[error("packet payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload size.
        size: usize,
        /// Largest size the header can carry.
        max: usize,
    },
}

impl ProtocolError {
    /// Check if this error was caused by a configuration problem rather than
    /// by the data on the wire.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::UnsupportedEncoding(_))
    }

    /// Check if this error means a decoder was handed bytes that disagree
    /// with their own framing.
    ///
    /// These are precondition violations: retrying the same read cannot
    /// succeed, and the exchange that produced them should be abandoned.
    #[must_use]
    pub fn is_framing_bug(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedEof { .. } | Self::CursorOutOfRange { .. }
        )
    }
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
