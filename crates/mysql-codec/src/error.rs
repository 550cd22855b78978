//! Codec error types.

use std::io;
use std::sync::Arc;

use mysql_protocol::{
    Buffer, MessageBody, ProtocolError, ServerError, ServerMessage, ServerMessageType, registry,
};
use thiserror::Error;

/// Errors that can occur while reading or writing messages.
///
/// The variants fall into four classes, each with a predicate:
///
/// | Class | Predicate | Variants |
/// |-------|-----------|----------|
/// | communications | [`is_communications`](Self::is_communications) | `Communications`, `ConnectionClosed` |
/// | protocol violation | [`is_protocol_violation`](Self::is_protocol_violation) | `UnexpectedMessage`, `Protocol` |
/// | server error | [`is_server_error`](Self::is_server_error) | `Server` |
/// | configuration | [`is_configuration`](Self::is_configuration) | `Protocol(UnsupportedEncoding)` |
///
/// None of them are retried at this layer. A server error is the server's
/// negative answer to the current exchange; the connection stays usable.
/// Communications errors usually mean the connection must be torn down.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The underlying I/O failed.
    #[error("communications failure: {0}")]
    Communications(#[source] Arc<io::Error>),

    /// The peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// A message other than the expected one arrived.
    #[error("unexpected message: expected {expected}, got {actual}")]
    UnexpectedMessage {
        /// Type the caller asked for.
        expected: ServerMessageType,
        /// Type that arrived.
        actual: ServerMessageType,
    },

    /// Protocol-level decoding error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server answered the exchange with an error.
    #[error("server error: {0}")]
    Server(ServerError),
}

impl From<io::Error> for CodecError {
    fn from(err: io::Error) -> Self {
        Self::Communications(Arc::new(err))
    }
}

impl CodecError {
    /// Check if the underlying connection failed or closed.
    #[must_use]
    pub fn is_communications(&self) -> bool {
        matches!(self, Self::Communications(_) | Self::ConnectionClosed)
    }

    /// Check if the peer violated the protocol (or this side mis-framed it).
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        match self {
            Self::UnexpectedMessage { .. } => true,
            Self::Protocol(err) => !err.is_configuration(),
            _ => false,
        }
    }

    /// Check if the server answered with an error.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Server(_))
    }

    /// Check if a configuration problem, such as an unknown character
    /// encoding, caused the failure.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Protocol(err) if err.is_configuration())
    }

    /// Get the server error, if this is one.
    #[must_use]
    pub fn server_error(&self) -> Option<&ServerError> {
        match self {
            Self::Server(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Check a decoded message against the type the caller asked for.
///
/// An `Error` message arriving in place of something else becomes
/// [`CodecError::Server`] carrying the decoded error body. Any other
/// mismatch is [`CodecError::UnexpectedMessage`].
pub fn expect_message(message: ServerMessage, expected: ServerMessageType) -> Result<ServerMessage> {
    if message.message_type() == expected {
        return Ok(message);
    }
    if registry::is_error_tag(message.tag()) {
        let mut body = Buffer::from(message.into_body());
        let error = ServerError::decode_body(&mut body)?;
        return Err(CodecError::Server(error));
    }
    Err(CodecError::UnexpectedMessage {
        expected,
        actual: message.message_type(),
    })
}
