//! Message types for the message protocol.
//!
//! Inbound and outbound messages have separate tag spaces. The same logical
//! step of an exchange is not guaranteed to share a tag in both directions:
//! `AuthenticateContinue` is tag 3 from the server and tag 5 from the client.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::buffer::Buffer;
use crate::error::{ProtocolError, Result};
use crate::frame::{FRAME_HEADER_SIZE, FrameHeader};

/// Message types sent by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServerMessageType {
    /// Generic success.
    Ok = 0,
    /// Error response for the current exchange.
    Error = 1,
    /// Connection capabilities.
    Capabilities = 2,
    /// Authentication challenge.
    AuthenticateContinue = 3,
    /// Authentication succeeded.
    AuthenticateOk = 4,
    /// Liveness probe, empty body.
    Ping = 5,
    /// Out-of-band notice (warnings, session state changes).
    Notice = 11,
    /// Result set column metadata.
    ColumnMetaData = 12,
    /// Result set row.
    Row = 13,
    /// End of the result set.
    FetchDone = 14,
    /// Cursor fetch suspended.
    FetchSuspended = 15,
    /// End of the result set, more result sets follow.
    FetchDoneMoreResultsets = 16,
    /// Statement execution finished.
    StmtExecuteOk = 17,
    /// End of the result set, output parameters follow.
    FetchDoneMoreOutParams = 18,
    /// Compressed message batch.
    Compression = 19,
}

impl ServerMessageType {
    /// Every registered inbound type.
    pub const ALL: [Self; 15] = [
        Self::Ok,
        Self::Error,
        Self::Capabilities,
        Self::AuthenticateContinue,
        Self::AuthenticateOk,
        Self::Ping,
        Self::Notice,
        Self::ColumnMetaData,
        Self::Row,
        Self::FetchDone,
        Self::FetchSuspended,
        Self::FetchDoneMoreResultsets,
        Self::StmtExecuteOk,
        Self::FetchDoneMoreOutParams,
        Self::Compression,
    ];

    /// Look up the message type for an inbound tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::Ok),
            1 => Ok(Self::Error),
            2 => Ok(Self::Capabilities),
            3 => Ok(Self::AuthenticateContinue),
            4 => Ok(Self::AuthenticateOk),
            5 => Ok(Self::Ping),
            11 => Ok(Self::Notice),
            12 => Ok(Self::ColumnMetaData),
            13 => Ok(Self::Row),
            14 => Ok(Self::FetchDone),
            15 => Ok(Self::FetchSuspended),
            16 => Ok(Self::FetchDoneMoreResultsets),
            17 => Ok(Self::StmtExecuteOk),
            18 => Ok(Self::FetchDoneMoreOutParams),
            19 => Ok(Self::Compression),
            _ => Err(ProtocolError::UnknownMessageType(tag)),
        }
    }

    /// The wire tag.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::Error => "Error",
            Self::Capabilities => "Capabilities",
            Self::AuthenticateContinue => "AuthenticateContinue",
            Self::AuthenticateOk => "AuthenticateOk",
            Self::Ping => "Ping",
            Self::Notice => "Notice",
            Self::ColumnMetaData => "ColumnMetaData",
            Self::Row => "Row",
            Self::FetchDone => "FetchDone",
            Self::FetchSuspended => "FetchSuspended",
            Self::FetchDoneMoreResultsets => "FetchDoneMoreResultsets",
            Self::StmtExecuteOk => "StmtExecuteOk",
            Self::FetchDoneMoreOutParams => "FetchDoneMoreOutParams",
            Self::Compression => "Compression",
        }
    }
}

impl fmt::Display for ServerMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Message types sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientMessageType {
    /// Request connection capabilities.
    CapabilitiesGet = 1,
    /// Set connection capabilities.
    CapabilitiesSet = 2,
    /// Close the connection.
    Close = 3,
    /// Start authentication.
    AuthenticateStart = 4,
    /// Answer an authentication challenge.
    AuthenticateContinue = 5,
    /// Reset the session.
    SessionReset = 6,
    /// Close the session.
    SessionClose = 7,
    /// Liveness probe, empty body.
    Ping = 8,
    /// Execute a statement.
    StmtExecute = 12,
    /// CRUD find.
    Find = 17,
    /// CRUD insert.
    Insert = 18,
    /// CRUD update.
    Update = 19,
    /// CRUD delete.
    Delete = 20,
    /// Open an expectation block.
    ExpectOpen = 24,
    /// Close an expectation block.
    ExpectClose = 25,
}

impl ClientMessageType {
    /// Every registered outbound type.
    pub const ALL: [Self; 15] = [
        Self::CapabilitiesGet,
        Self::CapabilitiesSet,
        Self::Close,
        Self::AuthenticateStart,
        Self::AuthenticateContinue,
        Self::SessionReset,
        Self::SessionClose,
        Self::Ping,
        Self::StmtExecute,
        Self::Find,
        Self::Insert,
        Self::Update,
        Self::Delete,
        Self::ExpectOpen,
        Self::ExpectClose,
    ];

    /// Look up the message type for an outbound tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(Self::CapabilitiesGet),
            2 => Ok(Self::CapabilitiesSet),
            3 => Ok(Self::Close),
            4 => Ok(Self::AuthenticateStart),
            5 => Ok(Self::AuthenticateContinue),
            6 => Ok(Self::SessionReset),
            7 => Ok(Self::SessionClose),
            8 => Ok(Self::Ping),
            12 => Ok(Self::StmtExecute),
            17 => Ok(Self::Find),
            18 => Ok(Self::Insert),
            19 => Ok(Self::Update),
            20 => Ok(Self::Delete),
            24 => Ok(Self::ExpectOpen),
            25 => Ok(Self::ExpectClose),
            _ => Err(ProtocolError::UnknownMessageType(tag)),
        }
    }

    /// The wire tag.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

/// Write one complete frame (header, tag and body).
fn encode_frame(tag: u8, body: &[u8], dst: &mut BytesMut) -> Result<()> {
    let header = FrameHeader::for_body(tag, body.len())?;
    dst.reserve(FRAME_HEADER_SIZE + body.len());
    header.encode(dst);
    dst.put_slice(body);
    Ok(())
}

/// A decoded inbound message.
///
/// The body is kept opaque; schema-aware layers decode it through
/// [`MessageBody`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMessage {
    message_type: ServerMessageType,
    body: Bytes,
}

impl ServerMessage {
    /// Create a message.
    #[must_use]
    pub fn new(message_type: ServerMessageType, body: Bytes) -> Self {
        Self { message_type, body }
    }

    /// Create a message with an empty body.
    #[must_use]
    pub fn empty(message_type: ServerMessageType) -> Self {
        Self::new(message_type, Bytes::new())
    }

    /// The message type.
    #[must_use]
    pub fn message_type(&self) -> ServerMessageType {
        self.message_type
    }

    /// The wire tag.
    #[must_use]
    pub fn tag(&self) -> u8 {
        self.message_type.tag()
    }

    /// The raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume the message and return the raw body.
    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Decode the body as `T` without checking the message type.
    pub fn decode_body<T: MessageBody>(&self) -> Result<T> {
        let mut buf = Buffer::from(self.body.clone());
        T::decode_body(&mut buf)
    }

    /// Frame the message as a server would send it.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        encode_frame(self.tag(), &self.body, dst)
    }
}

/// An outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMessage {
    message_type: ClientMessageType,
    body: Bytes,
}

impl ClientMessage {
    /// Create a message.
    #[must_use]
    pub fn new(message_type: ClientMessageType, body: Bytes) -> Self {
        Self { message_type, body }
    }

    /// Create a message with an empty body.
    #[must_use]
    pub fn empty(message_type: ClientMessageType) -> Self {
        Self::new(message_type, Bytes::new())
    }

    /// The message type.
    #[must_use]
    pub fn message_type(&self) -> ClientMessageType {
        self.message_type
    }

    /// The raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Size of the complete frame on the wire.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.body.len()
    }

    /// Frame the message for the wire.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        encode_frame(self.message_type.tag(), &self.body, dst)
    }
}

/// A typed inbound message body.
///
/// Higher layers that know concrete message schemas implement this for
/// their body types; the readers use [`MessageBody::MESSAGE_TYPE`] as the
/// expected type.
pub trait MessageBody: Sized {
    /// Message type carrying this body.
    const MESSAGE_TYPE: ServerMessageType;

    /// Decode the body from a buffer positioned at its first byte.
    fn decode_body(body: &mut Buffer) -> Result<Self>;
}

/// Severity of a server error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// The exchange failed; the session is still usable.
    Error,
    /// The session is no longer usable.
    Fatal,
}

/// Body of an `Error` message.
///
/// Layout: `u16` LE error code, `u8` severity (0 error, 1 fatal), 5-byte
/// ASCII SQL state, UTF-8 message filling the rest of the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    /// Server error code.
    pub code: u16,
    /// Error severity.
    pub severity: Severity,
    /// Five-character SQL state.
    pub sql_state: String,
    /// Error message.
    pub message: String,
}

/// Length of the SQL state field.
pub const SQL_STATE_LEN: usize = 5;

impl ServerError {
    /// Create an error with severity [`Severity::Error`].
    #[must_use]
    pub fn new(code: u16, sql_state: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            sql_state: sql_state.into(),
            message: message.into(),
        }
    }

    /// Mark the error as fatal.
    #[must_use]
    pub fn fatal(mut self) -> Self {
        self.severity = Severity::Fatal;
        self
    }

    /// Check if the session is no longer usable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    /// Encode the body. The SQL state is padded or cut to five characters.
    #[must_use]
    pub fn encode_body(&self) -> Bytes {
        let mut buf = Buffer::with_capacity(8 + self.message.len());
        buf.write_u16_le(self.code);
        buf.write_u8(match self.severity {
            Severity::Error => 0,
            Severity::Fatal => 1,
        });
        let mut state = [b'0'; SQL_STATE_LEN];
        for (slot, byte) in state.iter_mut().zip(self.sql_state.bytes()) {
            *slot = byte;
        }
        buf.write_bytes(&state);
        buf.write_bytes(self.message.as_bytes());
        buf.freeze()
    }

    /// Wrap the encoded body in an `Error` message.
    #[must_use]
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::new(ServerMessageType::Error, self.encode_body())
    }
}

impl MessageBody for ServerError {
    const MESSAGE_TYPE: ServerMessageType = ServerMessageType::Error;

    fn decode_body(body: &mut Buffer) -> Result<Self> {
        let code = body.read_u16_le()?;
        let severity = match body.read_u8()? {
            0 => Severity::Error,
            _ => Severity::Fatal,
        };
        let sql_state = body.read_string(SQL_STATE_LEN, "ascii")?;
        let message = crate::charset::decode_with(body.read_rest(), encoding_rs::UTF_8)?;
        Ok(Self {
            code,
            severity,
            sql_state,
            message,
        })
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERROR {} ({}): {}", self.code, self.sql_state, self.message)
    }
}

/// Body of an `Ok` message: an optional informational text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OkBody {
    /// Informational message, if the server sent one.
    pub message: Option<String>,
}

impl MessageBody for OkBody {
    const MESSAGE_TYPE: ServerMessageType = ServerMessageType::Ok;

    fn decode_body(body: &mut Buffer) -> Result<Self> {
        let rest = body.read_rest();
        if rest.is_empty() {
            return Ok(Self::default());
        }
        let message = crate::charset::decode_with(rest, encoding_rs::UTF_8)?;
        Ok(Self {
            message: Some(message),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_server_tags_roundtrip() {
        for ty in ServerMessageType::ALL {
            assert_eq!(ServerMessageType::from_tag(ty.tag()).unwrap(), ty);
        }
        assert_eq!(
            ServerMessageType::from_tag(6).unwrap_err(),
            ProtocolError::UnknownMessageType(6)
        );
    }

    #[test]
    fn test_client_tags_roundtrip() {
        for ty in ClientMessageType::ALL {
            assert_eq!(ClientMessageType::from_tag(ty.tag()).unwrap(), ty);
        }
        assert!(ClientMessageType::from_tag(0).is_err());
    }

    #[test]
    fn test_tag_spaces_differ() {
        assert_eq!(ServerMessageType::AuthenticateContinue.tag(), 3);
        assert_eq!(ClientMessageType::AuthenticateContinue.tag(), 5);
    }

    #[test]
    fn test_encode_empty_message() {
        let mut dst = BytesMut::new();
        ServerMessage::empty(ServerMessageType::Ping)
            .encode(&mut dst)
            .unwrap();
        assert_eq!(&dst[..], &[0x01, 0x00, 0x00, 0x00, 0x05]);
    }

    #[test]
    fn test_client_frame_len() {
        let msg = ClientMessage::new(ClientMessageType::StmtExecute, Bytes::from_static(b"SELECT 1"));
        let mut dst = BytesMut::new();
        msg.encode(&mut dst).unwrap();
        assert_eq!(dst.len(), msg.frame_len());
        assert_eq!(&dst[..5], &[9, 0, 0, 0, 12]);
    }

    #[test]
    fn test_server_error_body() {
        let error = ServerError::new(1064, "42000", "You have an error in your SQL syntax").fatal();
        let message = error.to_message();
        assert_eq!(message.message_type(), ServerMessageType::Error);

        let decoded: ServerError = message.decode_body().unwrap();
        assert_eq!(decoded, error);
        assert!(decoded.is_fatal());
        assert_eq!(
            decoded.to_string(),
            "ERROR 1064 (42000): You have an error in your SQL syntax"
        );
    }

    #[test]
    fn test_server_error_truncated_body() {
        let message = ServerMessage::new(ServerMessageType::Error, Bytes::from_static(&[0x01]));
        assert!(message.decode_body::<ServerError>().unwrap_err().is_framing_bug());
    }

    #[test]
    fn test_ok_body() {
        let empty = ServerMessage::empty(ServerMessageType::Ok);
        assert_eq!(empty.decode_body::<OkBody>().unwrap(), OkBody::default());

        let text = ServerMessage::new(ServerMessageType::Ok, Bytes::from_static(b"bye!"));
        assert_eq!(
            text.decode_body::<OkBody>().unwrap().message.as_deref(),
            Some("bye!")
        );
    }
}
