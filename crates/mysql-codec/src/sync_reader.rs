//! Blocking message reader.
//!
//! [`SyncMessageReader`] reads frames straight off a [`std::io::Read`]
//! source on the caller's thread. It keeps one piece of state between
//! calls: the header of the next frame, once something has asked for it.
//!
//! ```text
//! NoHeader ──next_message_type()──▶ HeaderRead { tag, body_len }
//!    ▲                                   │
//!    └──── read() / skip_message() ──────┘  (on success or failure)
//! ```

use std::io::{self, Read};

use bytes::{Bytes, BytesMut};
use mysql_protocol::frame::{FRAME_LENGTH_SIZE, FrameHeader};
use mysql_protocol::{MessageBody, ServerMessage, ServerMessageType, registry};

use crate::config::CodecConfig;
use crate::error::{CodecError, Result, expect_message};

/// Blocking reader of server messages.
///
/// A frame rejected for its length (zero, or over the configured maximum)
/// is skipped before the error is returned, so the next call starts on the
/// following frame.
///
/// Not safe to share across threads without external synchronization;
/// every operation blocks inside the underlying read until enough bytes
/// arrive. There is no timeout at this layer.
#[derive(Debug)]
pub struct SyncMessageReader<R> {
    reader: R,
    header: Option<FrameHeader>,
    max_frame_size: usize,
    /// Staging storage for frame bodies. Each message body is split off it,
    /// so the allocation is only reclaimed once the caller has dropped the
    /// previous message; otherwise the next frame allocates afresh.
    body: BytesMut,
}

impl<R: Read> SyncMessageReader<R> {
    /// Create a reader with default settings.
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, &CodecConfig::default())
    }

    /// Create a reader with the given configuration.
    pub fn with_config(reader: R, config: &CodecConfig) -> Self {
        Self {
            reader,
            header: None,
            max_frame_size: config.max_frame_size,
            body: BytesMut::with_capacity(config.read_buffer_size),
        }
    }

    /// Get a reference to the underlying source.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Get a mutable reference to the underlying source.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Consume the reader and return the underlying source.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Check if a frame header has been read but its body has not.
    #[must_use]
    pub fn has_pending_header(&self) -> bool {
        self.header.is_some()
    }

    /// Type of the next message, reading its header if needed.
    ///
    /// May block. The body is left unread, so calling this again returns
    /// the same type. An unregistered tag fails with
    /// `ProtocolError::UnknownMessageType` and stays pending;
    /// [`skip_message`](Self::skip_message) discards it.
    pub fn next_message_type(&mut self) -> Result<ServerMessageType> {
        let header = self.read_header()?;
        Ok(registry::message_type_for(header.tag)?)
    }

    /// Read the next message and check it is of the expected type.
    ///
    /// An `Error` message in its place becomes [`CodecError::Server`];
    /// any other type becomes [`CodecError::UnexpectedMessage`]. Either
    /// way the frame is consumed and the reader is ready for the next one.
    pub fn read(&mut self, expected: ServerMessageType) -> Result<ServerMessage> {
        let message = self.read_any()?;
        expect_message(message, expected)
    }

    /// Read the next message, whatever its type.
    pub fn read_any(&mut self) -> Result<ServerMessage> {
        let (tag, body) = self.read_frame()?;
        Ok(registry::decode(tag, body).into_message()?)
    }

    /// Read the next message and decode its body as `T`.
    pub fn read_body<T: MessageBody>(&mut self) -> Result<T> {
        let message = self.read(T::MESSAGE_TYPE)?;
        Ok(message.decode_body()?)
    }

    /// Consume the next frame without decoding it and return its tag.
    pub fn skip_message(&mut self) -> Result<u8> {
        let (tag, body) = self.read_frame()?;
        tracing::debug!(tag = tag, body_len = body.len(), "skipped message");
        Ok(tag)
    }

    fn read_header(&mut self) -> Result<FrameHeader> {
        if let Some(header) = self.header {
            return Ok(header);
        }

        let mut raw = [0u8; FRAME_LENGTH_SIZE];
        match read_full(&mut self.reader, &mut raw)? {
            0 => return Err(CodecError::ConnectionClosed),
            FRAME_LENGTH_SIZE => {}
            _ => return Err(truncated_frame()),
        }

        let body_len = match FrameHeader::decode_length(&mut &raw[..], self.max_frame_size) {
            Ok(body_len) => body_len,
            Err(err) => {
                // A zero length has nothing after it; anything else is
                // skipped so the next frame starts on a boundary.
                let length = u32::from_le_bytes(raw);
                if length > 0 {
                    self.discard(u64::from(length))?;
                }
                return Err(err.into());
            }
        };

        let mut tag = [0u8; 1];
        if read_full(&mut self.reader, &mut tag)? == 0 {
            return Err(truncated_frame());
        }

        let header = FrameHeader::for_body(tag[0], body_len)?;
        self.header = Some(header);
        Ok(header)
    }

    fn discard(&mut self, len: u64) -> Result<()> {
        let skipped = io::copy(&mut (&mut self.reader).take(len), &mut io::sink())?;
        tracing::debug!(length = len, "discarded rejected frame");
        if skipped < len {
            return Err(truncated_frame());
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<(u8, Bytes)> {
        let header = self.read_header()?;
        self.header = None;

        let body_len = header.body_len();
        self.body.clear();
        self.body.resize(body_len, 0);
        if read_full(&mut self.reader, &mut self.body)? < body_len {
            return Err(truncated_frame());
        }

        tracing::trace!(tag = header.tag, body_len = body_len, "read message frame");

        Ok((header.tag, self.body.split().freeze()))
    }
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn truncated_frame() -> CodecError {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "connection closed in the middle of a frame",
    )
    .into()
}
