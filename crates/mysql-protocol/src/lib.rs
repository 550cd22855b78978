//! # mysql-protocol
//!
//! IO-agnostic building blocks of the MySQL wire formats.
//!
//! This crate contains no networking logic and makes no assumptions about
//! the async runtime. It covers two codec families:
//!
//! - the classic protocol: a 4-byte packet preamble ([`PacketHeader`]) and
//!   a cursor-based [`Buffer`] for the primitives carried in payloads
//!   (fixed-width integers, length-encoded integers, null-terminated and
//!   length-prefixed strings)
//! - the message protocol: length-prefixed, type-tagged frames
//!   ([`FrameHeader`]) whose tags map to closed message sets
//!   ([`ServerMessageType`], [`ClientMessageType`]) through [`registry`]
//!
//! Higher-level crates build readers and writers on top of these.
//!
//! ## Example
//!
//! ```rust
//! use mysql_protocol::Buffer;
//!
//! let mut buf = Buffer::with_capacity(16);
//! buf.write_length_encoded(300);
//! buf.write_null_terminated_string("root", "utf8mb4").unwrap();
//!
//! let mut read = Buffer::from(buf.as_slice());
//! assert_eq!(read.read_length().unwrap(), 300);
//! assert_eq!(read.read_null_terminated_string("utf8mb4").unwrap(), "root");
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod buffer;
pub mod charset;
pub mod error;
pub mod frame;
pub mod message;
pub mod packet;
pub mod registry;

pub use buffer::{Buffer, DEFAULT_BUFFER_SIZE};
pub use error::{ProtocolError, Result};
pub use frame::{FRAME_HEADER_SIZE, FrameHeader};
pub use message::{
    ClientMessage, ClientMessageType, MessageBody, OkBody, ServerError, ServerMessage,
    ServerMessageType, Severity,
};
pub use packet::{MAX_PAYLOAD_LEN, PACKET_HEADER_SIZE, PacketHeader};
pub use registry::{ERROR_TAG, Inbound};
