//! Message listeners for the asynchronous reader.

use mysql_protocol::ServerMessage;
use tokio::sync::oneshot;

use crate::error::{CodecError, Result};

/// Consumer of inbound messages delivered by
/// [`AsyncMessageReader`](crate::AsyncMessageReader).
///
/// Listeners are served strictly in the order they were pushed. The active
/// listener receives every message until it reports that it is done; the
/// next queued listener then becomes active. Both callbacks run on the
/// reader task and must not block.
pub trait MessageListener: Send {
    /// Handle one message. Return `true` when this listener needs no more.
    fn on_message(&mut self, message: ServerMessage) -> bool;

    /// The reader failed before this listener was done.
    ///
    /// Called at most once, and never after `on_message` returned `true`.
    fn on_failure(&mut self, error: CodecError);
}

/// Listener that takes exactly one message and hands it to a oneshot
/// channel.
#[derive(Debug)]
pub struct OneshotListener {
    tx: Option<oneshot::Sender<Result<ServerMessage>>>,
}

impl OneshotListener {
    /// Create a listener and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, oneshot::Receiver<Result<ServerMessage>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    fn complete(&mut self, result: Result<ServerMessage>) {
        if let Some(tx) = self.tx.take() {
            // The receiver may have been dropped; nothing to deliver then.
            let _ = tx.send(result);
        }
    }
}

impl MessageListener for OneshotListener {
    fn on_message(&mut self, message: ServerMessage) -> bool {
        self.complete(Ok(message));
        true
    }

    fn on_failure(&mut self, error: CodecError) {
        self.complete(Err(error));
    }
}

/// Listener built from a closure.
///
/// The closure receives each message and returns `true` when done.
/// Failures are logged and otherwise dropped.
pub struct FnListener<F> {
    f: F,
}

impl<F> FnListener<F>
where
    F: FnMut(ServerMessage) -> bool + Send,
{
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> MessageListener for FnListener<F>
where
    F: FnMut(ServerMessage) -> bool + Send,
{
    fn on_message(&mut self, message: ServerMessage) -> bool {
        (self.f)(message)
    }

    fn on_failure(&mut self, error: CodecError) {
        tracing::debug!(error = %error, "listener failed");
    }
}

impl<F> std::fmt::Debug for FnListener<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnListener").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mysql_protocol::ServerMessageType;

    #[test]
    fn test_oneshot_delivers_message() {
        let (mut listener, mut rx) = OneshotListener::new();
        assert!(listener.on_message(ServerMessage::empty(ServerMessageType::Ok)));

        let message = rx.try_recv().unwrap().unwrap();
        assert_eq!(message.message_type(), ServerMessageType::Ok);
    }

    #[test]
    fn test_oneshot_delivers_failure() {
        let (mut listener, mut rx) = OneshotListener::new();
        listener.on_failure(CodecError::ConnectionClosed);

        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(matches!(err, CodecError::ConnectionClosed));
    }

    #[test]
    fn test_oneshot_receiver_dropped() {
        let (mut listener, rx) = OneshotListener::new();
        drop(rx);
        assert!(listener.on_message(ServerMessage::empty(ServerMessageType::Ok)));
    }

    #[test]
    fn test_fn_listener_counts() {
        let mut seen = 0;
        let mut listener = FnListener::new(move |_| {
            seen += 1;
            seen == 2
        });
        assert!(!listener.on_message(ServerMessage::empty(ServerMessageType::Row)));
        assert!(listener.on_message(ServerMessage::empty(ServerMessageType::FetchDone)));
    }
}
