//! Asynchronous message reader with a FIFO of listeners.
//!
//! The reader owns a task that pulls frames off the transport and hands
//! each decoded message to the active listener. Frame reassembly happens
//! inside [`MessageCodec`](crate::MessageCodec): a short read leaves the
//! partial frame in the read buffer and the task simply waits for the next
//! readiness event.
//!
//! ```text
//!            push_listener / read_message
//!                       │
//!                       ▼
//!   transport ──▶ MessageStream ──▶ active listener ◀── queue (FIFO)
//! ```
//!
//! Listeners are served in the order they were pushed, and messages in the
//! order they arrived. A listener stays active until `on_message` returns
//! `true`.
//!
//! # Failure
//!
//! When the transport fails or closes, or a protocol violation is decoded,
//! the reader stops. It calls the failure handler once, then fails the
//! active listener and every queued listener with the same error. Listeners
//! pushed afterwards fail immediately with [`CodecError::ConnectionClosed`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures_util::StreamExt;
use mysql_protocol::registry::Inbound;
use mysql_protocol::{ProtocolError, ServerMessage, ServerMessageType};
use parking_lot::Mutex;
use pin_project_lite::pin_project;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;

use crate::config::CodecConfig;
use crate::error::{CodecError, Result, expect_message};
use crate::framed::MessageStream;
use crate::listener::{MessageListener, OneshotListener};

type FailureHandler = Box<dyn FnMut(&CodecError) + Send>;
type ListenerQueue = mpsc::UnboundedReceiver<Box<dyn MessageListener>>;

/// State shared between the reader task and its handles.
#[derive(Default)]
struct ReaderState {
    /// Error that stopped the reader.
    failure: Mutex<Option<CodecError>>,
    /// Handler still waiting to be told about the failure.
    on_failure: Mutex<Option<FailureHandler>>,
}

impl ReaderState {
    fn fail(&self, error: &CodecError) {
        *self.failure.lock() = Some(error.clone());
        let handler = self.on_failure.lock().take();
        if let Some(mut handler) = handler {
            handler(error);
        }
    }
}

struct Inner {
    listeners: mpsc::UnboundedSender<Box<dyn MessageListener>>,
    state: Arc<ReaderState>,
    task: AbortHandle,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Asynchronous reader of server messages.
///
/// Cloning yields another handle to the same reader. The reader task is
/// stopped when the last handle is dropped.
#[derive(Clone)]
pub struct AsyncMessageReader {
    inner: Arc<Inner>,
}

impl AsyncMessageReader {
    /// Start reading from `transport` with default settings.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn start<R>(transport: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::with_config(transport, &CodecConfig::default())
    }

    /// Start reading from `transport` with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn with_config<R>(transport: R, config: &CodecConfig) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(ReaderState::default());
        let stream = MessageStream::with_config(transport, config);

        let task = tokio::spawn(run(
            stream,
            rx,
            Arc::clone(&state),
            config.ignore_unknown_messages,
        ));

        Self {
            inner: Arc::new(Inner {
                listeners: tx,
                state,
                task: task.abort_handle(),
            }),
        }
    }

    /// Queue a listener behind those already pushed.
    ///
    /// If the reader has stopped, the listener's `on_failure` is called with
    /// [`CodecError::ConnectionClosed`] and the same error is returned.
    pub fn push_listener(&self, listener: Box<dyn MessageListener>) -> Result<()> {
        match self.inner.listeners.send(listener) {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendError(mut listener)) => {
                listener.on_failure(CodecError::ConnectionClosed);
                Err(CodecError::ConnectionClosed)
            }
        }
    }

    /// Queue a one-message exchange and return its future.
    pub fn read_message(&self) -> PendingMessage {
        let (listener, rx) = OneshotListener::new();
        // A stopped reader fails the listener, which resolves the future.
        let _ = self.push_listener(Box::new(listener));
        PendingMessage { rx }
    }

    /// Wait for the next message and check it is of the expected type.
    ///
    /// Applies the same `Error` promotion as
    /// [`SyncMessageReader::read`](crate::SyncMessageReader::read).
    pub async fn read(&self, expected: ServerMessageType) -> Result<ServerMessage> {
        let message = self.read_message().await?;
        expect_message(message, expected)
    }

    /// Set the handler called once when the reader stops.
    ///
    /// If the reader has already stopped, the handler is called right away.
    /// Replaces any handler set before.
    pub fn set_failure_handler<F>(&self, handler: F)
    where
        F: FnMut(&CodecError) + Send + 'static,
    {
        let mut handler: FailureHandler = Box::new(handler);
        let mut slot = self.inner.state.on_failure.lock();
        let failure = self.inner.state.failure.lock().clone();
        match failure {
            Some(error) => {
                drop(slot);
                handler(&error);
            }
            None => *slot = Some(handler),
        }
    }

    /// The error that stopped the reader, if it has stopped.
    #[must_use]
    pub fn failure(&self) -> Option<CodecError> {
        self.inner.state.failure.lock().clone()
    }

    /// Check if the reader has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.listeners.is_closed()
    }
}

impl std::fmt::Debug for AsyncMessageReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncMessageReader")
            .field("closed", &self.is_closed())
            .field("failure", &self.failure())
            .finish()
    }
}

pin_project! {
    /// Future resolving to the message of one exchange.
    ///
    /// Resolves to [`CodecError::ConnectionClosed`] if the reader is
    /// dropped before the message arrives.
    #[derive(Debug)]
    pub struct PendingMessage {
        #[pin]
        rx: oneshot::Receiver<Result<ServerMessage>>,
    }
}

impl Future for PendingMessage {
    type Output = Result<ServerMessage>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match ready!(self.project().rx.poll(cx)) {
            Ok(result) => Poll::Ready(result),
            Err(_) => Poll::Ready(Err(CodecError::ConnectionClosed)),
        }
    }
}

async fn run<R>(
    mut stream: MessageStream<R>,
    mut queue: ListenerQueue,
    state: Arc<ReaderState>,
    ignore_unknown: bool,
) where
    R: AsyncRead + Unpin,
{
    tracing::debug!("message reader started");

    let mut current: Option<Box<dyn MessageListener>> = None;
    let error = loop {
        let message = match stream.next().await {
            Some(Ok(Inbound::Message(message))) => message,
            Some(Ok(Inbound::Unregistered { tag, body })) => {
                if ignore_unknown {
                    tracing::debug!(tag = tag, body_len = body.len(), "ignored unknown message");
                    continue;
                }
                break CodecError::from(ProtocolError::UnknownMessageType(tag));
            }
            Some(Err(error)) => break error,
            None => break CodecError::ConnectionClosed,
        };

        let mut listener = match current.take() {
            Some(listener) => listener,
            None => match queue.recv().await {
                Some(listener) => listener,
                None => {
                    tracing::debug!("all reader handles dropped, message reader stopped");
                    return;
                }
            },
        };

        tracing::trace!(message_type = %message.message_type(), "dispatching message");

        if !listener.on_message(message) {
            current = Some(listener);
        }
    };

    tracing::debug!(error = %error, "message reader stopped");
    state.fail(&error);
    fail_listeners(current, queue, &error).await;
}

async fn fail_listeners(
    current: Option<Box<dyn MessageListener>>,
    mut queue: ListenerQueue,
    error: &CodecError,
) {
    // Closing first makes later pushes fail instead of queueing forever.
    queue.close();

    let mut failed = 0usize;
    if let Some(mut listener) = current {
        listener.on_failure(error.clone());
        failed += 1;
    }
    while let Some(mut listener) = queue.recv().await {
        listener.on_failure(error.clone());
        failed += 1;
    }

    tracing::debug!(listeners = failed, "failed pending listeners");
}
