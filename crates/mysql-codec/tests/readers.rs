//! End-to-end reader tests.
//!
//! Frames are produced with the protocol crate's encoders and fed to each
//! reader through in-memory transports, so no server is needed.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use mysql_codec::{
    AsyncMessageReader, CodecError, FnListener, MessageListener, SyncMessageReader,
    SyncReadAdapter,
};
use mysql_protocol::{ServerError, ServerMessage, ServerMessageType};
use parking_lot::Mutex;

fn wire(messages: &[ServerMessage]) -> Vec<u8> {
    let mut dst = BytesMut::new();
    for message in messages {
        message.encode(&mut dst).expect("encode");
    }
    dst.to_vec()
}

fn row(text: &'static str) -> ServerMessage {
    ServerMessage::new(ServerMessageType::Row, Bytes::from_static(text.as_bytes()))
}

/// Listener that records what it receives and finishes after `limit`
/// messages.
struct Recorder {
    name: &'static str,
    limit: usize,
    seen: usize,
    log: Arc<Mutex<Vec<(&'static str, Bytes)>>>,
}

impl MessageListener for Recorder {
    fn on_message(&mut self, message: ServerMessage) -> bool {
        self.log.lock().push((self.name, message.into_body()));
        self.seen += 1;
        self.seen == self.limit
    }

    fn on_failure(&mut self, error: CodecError) {
        panic!("{} failed: {error}", self.name);
    }
}

// =============================================================================
// Synchronous reader
// =============================================================================

#[test]
fn test_ping_through_sync_reader() {
    let bytes = wire(&[ServerMessage::empty(ServerMessageType::Ping)]);
    assert_eq!(bytes, [0x01, 0x00, 0x00, 0x00, 5]);

    let mut reader = SyncMessageReader::new(Cursor::new(bytes));
    assert_eq!(reader.next_message_type().unwrap(), ServerMessageType::Ping);

    let message = reader.read(ServerMessageType::Ping).unwrap();
    assert_eq!(message, ServerMessage::empty(ServerMessageType::Ping));
}

#[test]
fn test_error_then_ok_through_sync_reader() {
    let bytes = wire(&[
        ServerError::new(1146, "42S02", "Table 'test.t' doesn't exist").to_message(),
        ServerMessage::empty(ServerMessageType::Ok),
    ]);
    let mut reader = SyncMessageReader::new(Cursor::new(bytes));

    let err = reader.read(ServerMessageType::Ok).unwrap_err();
    let server = err.server_error().expect("server error");
    assert_eq!(server.code, 1146);
    assert_eq!(server.sql_state, "42S02");
    assert_eq!(server.message, "Table 'test.t' doesn't exist");

    let ok = reader.read(ServerMessageType::Ok).unwrap();
    assert_eq!(ok.message_type(), ServerMessageType::Ok);
}

#[test]
fn test_mismatch_without_error_tag() {
    let bytes = wire(&[ServerMessage::empty(ServerMessageType::FetchDone)]);
    let mut reader = SyncMessageReader::new(Cursor::new(bytes));

    let err = reader.read(ServerMessageType::Row).unwrap_err();
    assert!(err.is_protocol_violation());
    assert!(!err.is_server_error());
}

// =============================================================================
// Asynchronous reader
// =============================================================================

#[tokio::test]
async fn test_listeners_served_in_order() {
    let bytes = wire(&[row("one"), row("two"), row("three")]);
    let transport = tokio_test::io::Builder::new().read(&bytes).build();
    let reader = AsyncMessageReader::start(transport);

    let log = Arc::new(Mutex::new(Vec::new()));
    for (name, limit) in [("L1", 1), ("L2", 2)] {
        reader
            .push_listener(Box::new(Recorder {
                name,
                limit,
                seen: 0,
                log: Arc::clone(&log),
            }))
            .unwrap();
    }

    // Queued behind L1 and L2; resolves once both are done.
    let after = reader.read_message();
    let err = after.await.unwrap_err();
    assert!(matches!(err, CodecError::ConnectionClosed));

    let log = log.lock();
    assert_eq!(
        *log,
        vec![
            ("L1", Bytes::from_static(b"one")),
            ("L2", Bytes::from_static(b"two")),
            ("L2", Bytes::from_static(b"three")),
        ]
    );
}

#[tokio::test]
async fn test_frame_one_byte_per_read() {
    let bytes = wire(&[
        ServerMessage::new(ServerMessageType::ColumnMetaData, Bytes::from_static(b"\x03id")),
        row("42"),
    ]);
    let mut builder = tokio_test::io::Builder::new();
    for byte in &bytes {
        builder.read(std::slice::from_ref(byte));
    }
    let reader = AsyncMessageReader::start(builder.build());

    let meta = reader.read(ServerMessageType::ColumnMetaData).await.unwrap();
    assert_eq!(&meta.body()[..], b"\x03id");
    let data = reader.read(ServerMessageType::Row).await.unwrap();
    assert_eq!(&data.body()[..], b"42");
}

#[tokio::test]
async fn test_channel_failure_fails_queued_listeners() {
    let transport = tokio_test::io::Builder::new()
        .read(&wire(&[row("partial")])[..6])
        .wait(Duration::from_millis(20))
        .read_error(std::io::Error::new(
            std::io::ErrorKind::ConnectionAborted,
            "aborted",
        ))
        .build();
    let reader = AsyncMessageReader::start(transport);

    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    reader.set_failure_handler(move |error| sink.lock().push(error.to_string()));

    let pending: Vec<_> = (0..3).map(|_| reader.read_message()).collect();
    for exchange in pending {
        let err = exchange.await.unwrap_err();
        assert!(err.is_communications());
    }

    assert_eq!(reported.lock().len(), 1);
    assert!(matches!(
        reader.read_message().await.unwrap_err(),
        CodecError::ConnectionClosed
    ));
}

#[tokio::test]
async fn test_listener_left_active_fails_on_close() {
    let bytes = wire(&[row("a")]);
    let transport = tokio_test::io::Builder::new().read(&bytes).build();
    let reader = AsyncMessageReader::start(transport);

    let (tx, rx) = tokio::sync::oneshot::channel();
    let mut tx = Some(tx);
    let mut rows = 0;
    reader
        .push_listener(Box::new(FnListener::new(move |_| {
            rows += 1;
            if let Some(tx) = tx.take() {
                let _ = tx.send(rows);
            }
            false
        })))
        .unwrap();

    assert_eq!(rx.await.unwrap(), 1);
    let next = reader.read_message().await.unwrap_err();
    assert!(next.is_communications());
}

// =============================================================================
// Blocking adapter
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_adapter_error_then_ok() {
    let bytes = wire(&[
        ServerError::new(1062, "23000", "Duplicate entry").to_message(),
        ServerMessage::empty(ServerMessageType::Ok),
    ]);
    let transport = tokio_test::io::Builder::new().read(&bytes).build();
    let reader = AsyncMessageReader::start(transport);

    let (first, second) = tokio::task::spawn_blocking(move || {
        let mut adapter = SyncReadAdapter::new(reader);
        let first = adapter.next(ServerMessageType::Ok);
        let second = adapter.next(ServerMessageType::Ok);
        (first, second)
    })
    .await
    .unwrap();

    assert_eq!(first.unwrap_err().server_error().unwrap().code, 1062);
    assert_eq!(second.unwrap().message_type(), ServerMessageType::Ok);
}
