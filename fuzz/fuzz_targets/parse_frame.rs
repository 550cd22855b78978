#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use mysql_protocol::{FrameHeader, ServerError, ServerMessageType, registry};

fuzz_target!(|data: &[u8]| {
    let mut cursor = data;
    let Ok(header) = FrameHeader::decode(&mut cursor, 1 << 20) else {
        return;
    };
    if cursor.len() < header.body_len() {
        return;
    }

    let body = Bytes::copy_from_slice(&cursor[..header.body_len()]);
    if let Ok(message) = registry::decode(header.tag, body).into_message() {
        if message.message_type() == ServerMessageType::Error {
            let _ = message.decode_body::<ServerError>();
        }
    }
});
