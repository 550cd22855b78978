//! Blocking facade over [`AsyncMessageReader`].

use mysql_protocol::{MessageBody, ServerMessage, ServerMessageType};

use crate::async_reader::AsyncMessageReader;
use crate::error::{CodecError, Result, expect_message};
use crate::listener::OneshotListener;

/// Blocking reads on top of an asynchronous reader.
///
/// Each call queues a one-message listener and parks the calling thread
/// until it fires. Calls take `&mut self`, so one adapter never has more
/// than one call in flight. Give each blocking caller its own adapter.
///
/// # Panics
///
/// The read methods panic if called from within an asynchronous
/// execution context. Use them from a plain thread or inside
/// `tokio::task::spawn_blocking`.
#[derive(Debug)]
pub struct SyncReadAdapter {
    reader: AsyncMessageReader,
}

impl SyncReadAdapter {
    /// Wrap a reader handle.
    #[must_use]
    pub fn new(reader: AsyncMessageReader) -> Self {
        Self { reader }
    }

    /// Block until the next message arrives and check its type.
    ///
    /// Applies the same `Error` promotion as
    /// [`SyncMessageReader::read`](crate::SyncMessageReader::read).
    pub fn next(&mut self, expected: ServerMessageType) -> Result<ServerMessage> {
        let message = self.next_any()?;
        expect_message(message, expected)
    }

    /// Block until the next message arrives, whatever its type.
    pub fn next_any(&mut self) -> Result<ServerMessage> {
        let (listener, rx) = OneshotListener::new();
        self.reader.push_listener(Box::new(listener))?;
        rx.blocking_recv()
            .map_err(|_| CodecError::ConnectionClosed)?
    }

    /// Block until the next message arrives and decode its body as `T`.
    pub fn next_body<T: MessageBody>(&mut self) -> Result<T> {
        let message = self.next(T::MESSAGE_TYPE)?;
        Ok(message.decode_body()?)
    }

    /// Get a reference to the underlying reader.
    #[must_use]
    pub fn reader(&self) -> &AsyncMessageReader {
        &self.reader
    }

    /// Consume the adapter and return the underlying reader.
    #[must_use]
    pub fn into_inner(self) -> AsyncMessageReader {
        self.reader
    }
}
