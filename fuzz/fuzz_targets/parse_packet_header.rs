#![no_main]

use libfuzzer_sys::fuzz_target;
use mysql_protocol::PacketHeader;

fuzz_target!(|data: &[u8]| {
    let mut cursor = data;
    if let Ok(header) = PacketHeader::decode(&mut cursor) {
        // Any decoded header must re-encode to the same four bytes.
        let encoded = header.encode_to_bytes();
        assert_eq!(&encoded[..], &data[..4]);
    }
});
