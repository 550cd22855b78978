//! Tag lookup in both directions.
//!
//! The message set is closed and known at build time, so lookup is a match
//! on the tag rather than a table populated at startup. Nothing here holds
//! resources and nothing needs teardown; every function is safe to call from
//! any thread.
//!
//! Tags the client does not implement are not necessarily fatal. A newer
//! server may send messages this client intentionally ignores, so
//! [`decode`] hands them back as [`Inbound::Unregistered`] and lets the
//! caller choose. [`message_type_for`] is the strict form.

use bytes::Bytes;

use crate::error::Result;
use crate::message::{ClientMessageType, ServerMessage, ServerMessageType};

/// Tag of the message the server sends in place of an expected reply when
/// the exchange failed.
pub const ERROR_TAG: u8 = ServerMessageType::Error as u8;

/// An inbound frame after tag lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A registered message.
    Message(ServerMessage),
    /// A tag with no registered message type.
    Unregistered {
        /// The wire tag.
        tag: u8,
        /// The raw body.
        body: Bytes,
    },
}

impl Inbound {
    /// Turn an unregistered tag into an `UnknownMessageType` error.
    pub fn into_message(self) -> Result<ServerMessage> {
        match self {
            Self::Message(message) => Ok(message),
            Self::Unregistered { tag, .. } => Err(crate::ProtocolError::UnknownMessageType(tag)),
        }
    }
}

/// Inbound tag to message type. Fails for unregistered tags.
pub fn message_type_for(tag: u8) -> Result<ServerMessageType> {
    ServerMessageType::from_tag(tag)
}

/// Build the inbound message for a tag and body.
#[must_use]
pub fn decode(tag: u8, body: Bytes) -> Inbound {
    match ServerMessageType::from_tag(tag) {
        Ok(message_type) => Inbound::Message(ServerMessage::new(message_type, body)),
        Err(_) => Inbound::Unregistered { tag, body },
    }
}

/// Outbound message type to tag.
#[must_use]
pub const fn outbound_tag_for(message_type: ClientMessageType) -> u8 {
    message_type.tag()
}

/// Check if an inbound tag is the designated error tag.
#[must_use]
pub const fn is_error_tag(tag: u8) -> bool {
    tag == ERROR_TAG
}
