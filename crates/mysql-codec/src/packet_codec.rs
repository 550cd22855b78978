//! Classic protocol packet codec implementation.

use bytes::{BufMut, BytesMut};
use mysql_protocol::ProtocolError;
use mysql_protocol::packet::{MAX_PAYLOAD_LEN, PACKET_HEADER_SIZE, PacketHeader};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::CodecConfig;
use crate::error::CodecError;

/// A classic packet with header and payload.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Packet header.
    pub header: PacketHeader,
    /// Packet payload (excluding header).
    pub payload: BytesMut,
}

impl Packet {
    /// Create a new packet with the given header and payload.
    #[must_use]
    pub fn new(header: PacketHeader, payload: BytesMut) -> Self {
        Self { header, payload }
    }

    /// Get the total packet size including header.
    #[must_use]
    pub fn total_size(&self) -> usize {
        PACKET_HEADER_SIZE + self.payload.len()
    }

    /// Check if another packet continues this payload.
    #[must_use]
    pub fn has_continuation(&self) -> bool {
        self.payload.len() == MAX_PAYLOAD_LEN
    }
}

/// Classic packet codec for tokio-util framing.
///
/// Client and server share one sequence counter per command: the client
/// sends sequence 0, the server answers with 1, and so on, wrapping at 255.
/// The decoder rejects packets that skip or repeat a sequence id; the
/// encoder stamps outgoing headers.
#[derive(Debug)]
pub struct PacketCodec {
    /// Maximum payload size to accept or send.
    max_payload: usize,
    /// Next expected or assigned sequence id.
    sequence_id: u8,
}

impl PacketCodec {
    /// Create a new codec with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_payload: MAX_PAYLOAD_LEN,
            sequence_id: 0,
        }
    }

    /// Create a new codec using the configured packet payload limit.
    #[must_use]
    pub fn with_config(config: &CodecConfig) -> Self {
        Self::new().with_max_payload(config.max_packet_payload)
    }

    /// Create a new codec with a custom maximum payload size.
    #[must_use]
    pub fn with_max_payload(mut self, size: usize) -> Self {
        self.max_payload = size.min(MAX_PAYLOAD_LEN);
        self
    }

    /// The sequence id the next packet will carry.
    #[must_use]
    pub fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    /// Start a new command: the next packet carries sequence id 0.
    pub fn reset_sequence(&mut self) {
        self.sequence_id = 0;
    }

    fn advance_sequence(&mut self) {
        self.sequence_id = self.sequence_id.wrapping_add(1);
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Need at least a header to proceed
        if src.len() < PACKET_HEADER_SIZE {
            return Ok(None);
        }

        let length = u32::from_le_bytes([src[0], src[1], src[2], 0]) as usize;
        if length > self.max_payload {
            return Err(ProtocolError::PayloadTooLarge {
                size: length,
                max: self.max_payload,
            }
            .into());
        }

        let total = PACKET_HEADER_SIZE + length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut header_bytes = src.split_to(PACKET_HEADER_SIZE);
        let header = PacketHeader::decode(&mut header_bytes)?;
        let payload = src.split_to(length);

        if header.sequence_id != self.sequence_id {
            return Err(ProtocolError::PacketOutOfOrder {
                expected: self.sequence_id,
                actual: header.sequence_id,
            }
            .into());
        }
        self.advance_sequence();

        tracing::trace!(
            length = length,
            sequence_id = header.sequence_id,
            "decoded classic packet"
        );

        Ok(Some(Packet::new(header, payload)))
    }
}

impl Encoder<BytesMut> for PacketCodec {
    type Error = CodecError;

    fn encode(&mut self, payload: BytesMut, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if payload.len() > self.max_payload {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload,
            }
            .into());
        }

        let header = PacketHeader::new(payload.len(), self.sequence_id)?;
        self.advance_sequence();

        dst.reserve(PACKET_HEADER_SIZE + payload.len());
        header.encode(dst);
        dst.put_slice(&payload);

        tracing::trace!(
            length = payload.len(),
            sequence_id = header.sequence_id,
            "encoded classic packet"
        );

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw_packet(sequence_id: u8, payload: &[u8]) -> BytesMut {
        let mut data = BytesMut::new();
        data.put_uint_le(payload.len() as u64, 3);
        data.put_u8(sequence_id);
        data.put_slice(payload);
        data
    }

    #[test]
    fn test_decode_packet() {
        let mut codec = PacketCodec::new();
        let mut data = raw_packet(0, b"\x03SELECT 1");

        let packet = codec.decode(&mut data).unwrap().unwrap();
        assert_eq!(packet.header.payload_length, 9);
        assert_eq!(packet.header.sequence_id, 0);
        assert_eq!(&packet.payload[..], b"\x03SELECT 1");
        assert_eq!(codec.sequence_id(), 1);
    }

    #[test]
    fn test_encode_packet() {
        let mut codec = PacketCodec::new();
        let mut dst = BytesMut::new();
        codec.encode(BytesMut::from(&b"\x0e"[..]), &mut dst).unwrap();

        assert_eq!(&dst[..], &[0x01, 0x00, 0x00, 0x00, 0x0e]);
        assert_eq!(codec.sequence_id(), 1);
    }

    #[test]
    fn test_incomplete_packet() {
        let mut codec = PacketCodec::new();
        let full = raw_packet(0, b"abcd");
        let mut data = BytesMut::from(&full[..6]);

        assert!(codec.decode(&mut data).unwrap().is_none());
        assert_eq!(codec.sequence_id(), 0);
    }

    #[test]
    fn test_out_of_order() {
        let mut codec = PacketCodec::new();
        let mut data = raw_packet(3, b"x");

        let err = codec.decode(&mut data).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolError::PacketOutOfOrder {
                expected: 0,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_shared_sequence() {
        let mut codec = PacketCodec::new();
        let mut dst = BytesMut::new();
        codec.encode(BytesMut::from(&b"\x01"[..]), &mut dst).unwrap();

        // The server answers with the next id.
        let mut data = raw_packet(1, b"\x00");
        assert!(codec.decode(&mut data).unwrap().is_some());

        codec.reset_sequence();
        assert_eq!(codec.sequence_id(), 0);
    }

    #[test]
    fn test_sequence_wraps() {
        let mut codec = PacketCodec::new();
        let mut dst = BytesMut::new();
        for _ in 0..256 {
            codec.encode(BytesMut::new(), &mut dst).unwrap();
        }
        assert_eq!(codec.sequence_id(), 0);
    }

    #[test]
    fn test_payload_too_large() {
        let mut codec = PacketCodec::new().with_max_payload(2);
        let mut dst = BytesMut::new();
        assert!(codec.encode(BytesMut::from(&b"abc"[..]), &mut dst).is_err());

        let mut data = raw_packet(0, b"abc");
        assert!(codec.decode(&mut data).is_err());
    }

    #[test]
    fn test_config_payload_limit() {
        let config = CodecConfig::new().max_packet_payload(3);
        let mut codec = PacketCodec::with_config(&config);
        let mut dst = BytesMut::new();
        codec.encode(BytesMut::from(&b"abc"[..]), &mut dst).unwrap();

        let err = codec
            .encode(BytesMut::from(&b"abcd"[..]), &mut dst)
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolError::PayloadTooLarge { size: 4, max: 3 })
        ));
    }
}
