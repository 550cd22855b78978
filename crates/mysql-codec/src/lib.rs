//! # mysql-codec
//!
//! Framing layer and message readers for the MySQL wire protocols.
//!
//! This crate turns byte streams into [`ServerMessage`]s and back, on
//! either a blocking source or a tokio transport, and hands messages to the
//! session and statement layers above.
//!
//! ## Features
//!
//! - Blocking reads with peek-before-decode ([`SyncMessageReader`])
//! - Asynchronous reads dispatched to a FIFO of listeners
//!   ([`AsyncMessageReader`])
//! - A blocking facade over the asynchronous reader ([`SyncReadAdapter`])
//! - Frame reassembly across partial reads via tokio-util codecs
//! - Classic packet framing with sequence checks and payload reassembly
//!
//! ## Architecture
//!
//! ```text
//! io::Read   → SyncMessageReader ───────────────────────────▶ caller
//! AsyncRead  → MessageCodec → AsyncMessageReader → listeners ─▶ caller
//!                                              └→ SyncReadAdapter
//! ```
//!
//! All readers promote an `Error` message that arrives in place of the
//! expected one to [`CodecError::Server`]:
//!
//! ```rust,no_run
//! use mysql_codec::{CodecError, SyncMessageReader};
//! use mysql_protocol::ServerMessageType;
//!
//! # fn run(stream: std::net::TcpStream) -> mysql_codec::Result<()> {
//! let mut reader = SyncMessageReader::new(stream);
//! match reader.read(ServerMessageType::StmtExecuteOk) {
//!     Ok(_) => {}
//!     Err(CodecError::Server(err)) => eprintln!("statement failed: {err}"),
//!     Err(err) => return Err(err),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod assembler;
pub mod async_reader;
pub mod config;
pub mod error;
pub mod frame_codec;
pub mod framed;
pub mod listener;
pub mod packet_codec;
pub mod sync_adapter;
pub mod sync_reader;
pub mod writer;

pub use assembler::{PacketAssembler, split_payload};
pub use async_reader::{AsyncMessageReader, PendingMessage};
pub use config::CodecConfig;
pub use error::{CodecError, Result, expect_message};
pub use frame_codec::MessageCodec;
pub use framed::{MessageStream, MessageWriter};
pub use listener::{FnListener, MessageListener, OneshotListener};
pub use packet_codec::{Packet, PacketCodec};
pub use sync_adapter::SyncReadAdapter;
pub use sync_reader::SyncMessageReader;
pub use writer::SyncMessageWriter;

pub use mysql_protocol::{ServerMessage, ServerMessageType};
