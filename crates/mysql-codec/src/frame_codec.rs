//! Message protocol frame codec.
//!
//! The decoder is a two-state machine re-entered every time the transport
//! delivers more bytes:
//!
//! ```text
//! Header ──(5 bytes available)──▶ Body { tag, body_len }
//!   ▲                                  │
//!   └────(body_len bytes available)────┘  emit message
//! ```
//!
//! When too few bytes are buffered the decoder returns `Ok(None)` and the
//! framed reader issues another read against the same buffer, so a frame
//! arriving one byte per read is reassembled without copying partial data.

use bytes::{Buf, BytesMut};
use mysql_protocol::frame::{FRAME_HEADER_SIZE, FrameHeader};
use mysql_protocol::registry::{self, Inbound};
use mysql_protocol::{ClientMessage, ProtocolError};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::DEFAULT_MAX_FRAME_SIZE;
use crate::error::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Header,
    Body { tag: u8, body_len: usize },
}

/// Frame codec for tokio-util framing.
///
/// Decodes server frames into [`Inbound`] values and encodes
/// [`ClientMessage`]s.
#[derive(Debug)]
pub struct MessageCodec {
    /// Maximum accepted frame length.
    max_frame_size: usize,
    state: DecodeState,
}

impl MessageCodec {
    /// Create a new codec with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            state: DecodeState::Header,
        }
    }

    /// Create a new codec with a custom maximum frame size.
    #[must_use]
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size.min(u32::MAX as usize);
        self
    }

    /// Maximum accepted frame length.
    #[must_use]
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Check if part of a frame has been consumed.
    #[must_use]
    pub fn is_mid_frame(&self) -> bool {
        matches!(self.state, DecodeState::Body { .. })
    }

    fn decode_header(&mut self, src: &mut BytesMut) -> Result<Option<(u8, usize)>, CodecError> {
        if src.len() < FRAME_HEADER_SIZE {
            src.reserve(FRAME_HEADER_SIZE - src.len());
            return Ok(None);
        }

        let mut cursor = &src[..FRAME_HEADER_SIZE];
        let header = FrameHeader::decode(&mut cursor, self.max_frame_size)?;
        src.advance(FRAME_HEADER_SIZE);

        let body_len = header.body_len();
        if src.len() < body_len {
            src.reserve(body_len - src.len());
        }
        Ok(Some((header.tag, body_len)))
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MessageCodec {
    type Item = Inbound;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let (tag, body_len) = match self.state {
            DecodeState::Header => match self.decode_header(src)? {
                Some((tag, body_len)) => {
                    self.state = DecodeState::Body { tag, body_len };
                    (tag, body_len)
                }
                None => return Ok(None),
            },
            DecodeState::Body { tag, body_len } => (tag, body_len),
        };

        if src.len() < body_len {
            return Ok(None);
        }

        let body = src.split_to(body_len).freeze();
        self.state = DecodeState::Header;

        tracing::trace!(tag = tag, body_len = body_len, "decoded message frame");

        Ok(Some(registry::decode(tag, body)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None if src.is_empty() && !self.is_mid_frame() => Ok(None),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed in the middle of a frame",
            )
            .into()),
        }
    }
}

impl Encoder<ClientMessage> for MessageCodec {
    type Error = CodecError;

    fn encode(&mut self, item: ClientMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // The length field counts the tag and the body.
        let length = item.body().len() + 1;
        if length > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: length,
                max: self.max_frame_size,
            }
            .into());
        }

        item.encode(dst)?;

        tracing::trace!(
            message_type = ?item.message_type(),
            length = item.frame_len(),
            "encoded message frame"
        );

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::{BufMut, Bytes};
    use mysql_protocol::{ClientMessageType, ServerMessage, ServerMessageType};

    fn frame(tag: u8, body: &[u8]) -> BytesMut {
        let mut data = BytesMut::new();
        data.put_u32_le(body.len() as u32 + 1);
        data.put_u8(tag);
        data.put_slice(body);
        data
    }

    fn expect_message(inbound: Inbound) -> ServerMessage {
        inbound.into_message().unwrap()
    }

    #[test]
    fn test_decode_frame() {
        let mut codec = MessageCodec::new();
        let mut data = frame(13, b"row-data");

        let message = expect_message(codec.decode(&mut data).unwrap().unwrap());
        assert_eq!(message.message_type(), ServerMessageType::Row);
        assert_eq!(&message.body()[..], b"row-data");
        assert!(data.is_empty());
        assert!(!codec.is_mid_frame());
    }

    #[test]
    fn test_incomplete_header() {
        let mut codec = MessageCodec::new();
        let mut data = BytesMut::from(&[0x03, 0x00][..]);
        assert!(codec.decode(&mut data).unwrap().is_none());
        assert!(!codec.is_mid_frame());
    }

    #[test]
    fn test_body_split_across_reads() {
        let mut codec = MessageCodec::new();
        let full = frame(0, b"hello");

        let mut data = BytesMut::from(&full[..7]);
        assert!(codec.decode(&mut data).unwrap().is_none());
        assert!(codec.is_mid_frame());

        data.extend_from_slice(&full[7..]);
        let message = expect_message(codec.decode(&mut data).unwrap().unwrap());
        assert_eq!(&message.body()[..], b"hello");
    }

    #[test]
    fn test_one_byte_at_a_time() {
        let mut codec = MessageCodec::new();
        let full = frame(17, b"done");
        let mut data = BytesMut::new();
        let mut decoded = None;

        for &byte in full.iter() {
            assert!(decoded.is_none());
            data.put_u8(byte);
            decoded = codec.decode(&mut data).unwrap();
        }

        let message = expect_message(decoded.unwrap());
        assert_eq!(message.message_type(), ServerMessageType::StmtExecuteOk);
    }

    #[test]
    fn test_two_frames_in_one_read() {
        let mut codec = MessageCodec::new();
        let mut data = frame(1, b"");
        data.extend_from_slice(&frame(0, b""));

        let first = expect_message(codec.decode(&mut data).unwrap().unwrap());
        let second = expect_message(codec.decode(&mut data).unwrap().unwrap());
        assert_eq!(first.message_type(), ServerMessageType::Error);
        assert_eq!(second.message_type(), ServerMessageType::Ok);
        assert!(codec.decode(&mut data).unwrap().is_none());
    }

    #[test]
    fn test_unregistered_tag() {
        let mut codec = MessageCodec::new();
        let mut data = frame(99, b"?");
        assert_eq!(
            codec.decode(&mut data).unwrap().unwrap(),
            Inbound::Unregistered {
                tag: 99,
                body: Bytes::from_static(b"?")
            }
        );
    }

    #[test]
    fn test_frame_too_large() {
        let mut codec = MessageCodec::new().with_max_frame_size(8);
        let mut data = frame(13, &[0; 16]);
        let err = codec.decode(&mut data).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolError::FrameTooLarge { size: 17, max: 8 })
        ));
    }

    #[test]
    fn test_zero_length_frame() {
        let mut codec = MessageCodec::new();
        let mut data = BytesMut::from(&[0, 0, 0, 0, 0][..]);
        assert!(matches!(
            codec.decode(&mut data).unwrap_err(),
            CodecError::Protocol(ProtocolError::InvalidFrameLength(0))
        ));
    }

    #[test]
    fn test_eof_mid_frame() {
        let mut codec = MessageCodec::new();
        let full = frame(13, b"row");
        let mut data = BytesMut::from(&full[..5]);

        let err = codec.decode_eof(&mut data).unwrap_err();
        assert!(err.is_communications());
    }

    #[test]
    fn test_eof_between_frames() {
        let mut codec = MessageCodec::new();
        let mut data = BytesMut::new();
        assert!(codec.decode_eof(&mut data).unwrap().is_none());
    }

    #[test]
    fn test_encode_message() {
        let mut codec = MessageCodec::new();
        let message = ClientMessage::new(ClientMessageType::StmtExecute, Bytes::from_static(b"q"));

        let mut dst = BytesMut::new();
        codec.encode(message, &mut dst).unwrap();
        assert_eq!(&dst[..], &[0x02, 0x00, 0x00, 0x00, 12, b'q']);
    }

    #[test]
    fn test_encode_too_large() {
        let mut codec = MessageCodec::new().with_max_frame_size(2);
        let message = ClientMessage::new(ClientMessageType::StmtExecute, Bytes::from_static(b"abc"));
        let mut dst = BytesMut::new();
        assert!(codec.encode(message, &mut dst).is_err());
        assert!(dst.is_empty());
    }
}
