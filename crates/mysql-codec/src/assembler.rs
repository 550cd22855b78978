//! Classic packet reassembly.
//!
//! A payload of 16 MiB or more travels as a run of maximum-size packets
//! followed by one shorter packet, possibly empty. This module joins such
//! runs back into one payload and splits outgoing payloads the same way.

use bytes::BytesMut;
use mysql_protocol::{Buffer, DEFAULT_BUFFER_SIZE, MAX_PAYLOAD_LEN};

use crate::config::CodecConfig;
use crate::packet_codec::Packet;

/// Reassembles classic packets into complete payloads.
///
/// The payload is accumulated in a [`Buffer`] so callers can decode it with
/// the length-encoded primitives directly.
#[derive(Debug)]
pub struct PacketAssembler {
    /// Accumulated payload.
    buffer: Buffer,
    /// Payload size that signals a continuation packet.
    max_payload: usize,
    /// Number of packets accumulated.
    packet_count: usize,
    /// Storage allocated for each new payload.
    initial_capacity: usize,
}

impl PacketAssembler {
    /// Create a new packet assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new packet assembler with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Buffer::with_capacity(capacity),
            max_payload: MAX_PAYLOAD_LEN,
            packet_count: 0,
            initial_capacity: capacity,
        }
    }

    /// Create an assembler sized and limited by the configuration.
    ///
    /// Uses `read_buffer_size` as the initial capacity and
    /// `max_packet_payload` as the continuation threshold.
    #[must_use]
    pub fn with_config(config: &CodecConfig) -> Self {
        Self::with_capacity(config.read_buffer_size).with_max_payload(config.max_packet_payload)
    }

    /// Set the payload size that marks a continuation packet.
    ///
    /// Must match the peer's packet limit.
    #[must_use]
    pub fn with_max_payload(mut self, size: usize) -> Self {
        self.max_payload = size.clamp(1, MAX_PAYLOAD_LEN);
        self
    }

    /// Push a packet into the assembler.
    ///
    /// Returns the complete payload, positioned at its first byte, once a
    /// packet shorter than the maximum arrives.
    pub fn push(&mut self, packet: Packet) -> Option<Buffer> {
        let continues = packet.payload.len() >= self.max_payload;
        self.buffer.write_bytes(&packet.payload);
        self.packet_count += 1;

        tracing::trace!(
            sequence_id = packet.header.sequence_id,
            packet_count = self.packet_count,
            buffer_len = self.buffer.len(),
            continues = continues,
            "assembling payload"
        );

        if continues {
            return None;
        }

        self.packet_count = 0;
        let mut payload = std::mem::replace(
            &mut self.buffer,
            Buffer::with_capacity(self.initial_capacity),
        );
        payload.rewind();
        Some(payload)
    }

    /// Check if the assembler has partial data buffered.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        self.packet_count > 0
    }

    /// Get the number of packets accumulated so far.
    #[must_use]
    pub fn packet_count(&self) -> usize {
        self.packet_count
    }

    /// Get the current buffer length.
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear any partial payload data.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.packet_count = 0;
    }
}

impl Default for PacketAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a payload into packet-sized chunks.
///
/// A payload whose length is an exact multiple of `max_payload` gets an
/// empty trailing chunk so the receiver sees a short packet.
#[must_use]
pub fn split_payload(payload: &[u8], max_payload: usize) -> Vec<BytesMut> {
    let max_payload = max_payload.clamp(1, MAX_PAYLOAD_LEN);
    let mut chunks: Vec<BytesMut> = payload.chunks(max_payload).map(BytesMut::from).collect();
    if payload.len() % max_payload == 0 {
        chunks.push(BytesMut::new());
    }
    chunks
}
