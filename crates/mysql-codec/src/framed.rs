//! Framed message stream and sink for async I/O.
//!
//! - `MessageStream<T>` - read side, yields inbound frames after tag lookup
//! - `MessageWriter<T>` - write side, a sink of outbound messages
//!
//! [`AsyncMessageReader`](crate::AsyncMessageReader) drives a
//! `MessageStream` on its own task; session layers write through a
//! `MessageWriter` on the other half of the transport.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::BytesMut;
use futures_core::Stream;
use futures_util::Sink;
use mysql_protocol::ClientMessage;
use mysql_protocol::registry::Inbound;
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::config::CodecConfig;
use crate::error::CodecError;
use crate::frame_codec::MessageCodec;

pin_project! {
    /// A read-only stream of message frames.
    pub struct MessageStream<T> {
        #[pin]
        inner: FramedRead<T, MessageCodec>,
    }
}

impl<T> MessageStream<T>
where
    T: AsyncRead,
{
    /// Create a new message stream over the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            inner: FramedRead::new(transport, MessageCodec::new()),
        }
    }

    /// Create a new message stream with the given configuration.
    pub fn with_config(transport: T, config: &CodecConfig) -> Self {
        let codec = MessageCodec::new().with_max_frame_size(config.max_frame_size);
        Self {
            inner: FramedRead::with_capacity(transport, codec, config.read_buffer_size),
        }
    }

    /// Get a reference to the underlying transport.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }

    /// Get a mutable reference to the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    /// Get a reference to the codec.
    pub fn codec(&self) -> &MessageCodec {
        self.inner.decoder()
    }

    /// Get a reference to the read buffer.
    pub fn read_buffer(&self) -> &BytesMut {
        self.inner.read_buffer()
    }

    /// Consume the stream and return the underlying transport.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T> Stream for MessageStream<T>
where
    T: AsyncRead + Unpin,
{
    type Item = Result<Inbound, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

impl<T> std::fmt::Debug for MessageStream<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStream")
            .field("transport", self.inner.get_ref())
            .field("mid_frame", &self.inner.decoder().is_mid_frame())
            .finish()
    }
}

pin_project! {
    /// A write-only sink of outbound messages.
    pub struct MessageWriter<T> {
        #[pin]
        inner: FramedWrite<T, MessageCodec>,
    }
}

impl<T> MessageWriter<T>
where
    T: AsyncWrite,
{
    /// Create a new message writer over the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            inner: FramedWrite::new(transport, MessageCodec::new()),
        }
    }

    /// Create a new message writer with the given configuration.
    pub fn with_config(transport: T, config: &CodecConfig) -> Self {
        let codec = MessageCodec::new().with_max_frame_size(config.max_frame_size);
        Self {
            inner: FramedWrite::new(transport, codec),
        }
    }

    /// Get a reference to the underlying transport.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }

    /// Get a mutable reference to the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    /// Consume the writer and return the underlying transport.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T> Sink<ClientMessage> for MessageWriter<T>
where
    T: AsyncWrite + Unpin,
{
    type Error = CodecError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: ClientMessage) -> Result<(), Self::Error> {
        self.project().inner.start_send(item)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_close(cx)
    }
}

impl<T> std::fmt::Debug for MessageWriter<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageWriter")
            .field("transport", self.inner.get_ref())
            .finish()
    }
}
