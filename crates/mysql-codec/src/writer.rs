//! Blocking message writer.

use std::io::Write;

use bytes::BytesMut;
use mysql_protocol::{ClientMessage, ProtocolError};

use crate::config::CodecConfig;
use crate::error::Result;

/// Blocking writer of client messages.
///
/// Frames are staged in a reused buffer and flushed after every message.
#[derive(Debug)]
pub struct SyncMessageWriter<W> {
    writer: W,
    max_frame_size: usize,
    buffer: BytesMut,
}

impl<W: Write> SyncMessageWriter<W> {
    /// Create a writer with default settings.
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, &CodecConfig::default())
    }

    /// Create a writer with the given configuration.
    pub fn with_config(writer: W, config: &CodecConfig) -> Self {
        Self {
            writer,
            max_frame_size: config.max_frame_size,
            buffer: BytesMut::with_capacity(config.read_buffer_size),
        }
    }

    /// Frame, write and flush one message.
    pub fn write(&mut self, message: &ClientMessage) -> Result<()> {
        let length = message.body().len() + 1;
        if length > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: length,
                max: self.max_frame_size,
            }
            .into());
        }

        self.buffer.clear();
        message.encode(&mut self.buffer)?;
        self.writer.write_all(&self.buffer)?;
        self.writer.flush()?;

        tracing::trace!(
            message_type = ?message.message_type(),
            length = self.buffer.len(),
            "wrote message frame"
        );

        Ok(())
    }

    /// Get a reference to the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Consume the writer and return the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
