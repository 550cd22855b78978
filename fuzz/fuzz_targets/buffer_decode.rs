#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mysql_protocol::Buffer;

/// One cursor operation against fuzzed bytes.
#[derive(Debug, Arbitrary)]
enum Op {
    U8,
    U16,
    U24,
    U32,
    U64,
    FieldLength,
    Length,
    LengthEncodedBytes,
    NullTerminated,
    String(u8),
    Skip(u8),
    Rewind,
}

#[derive(Debug, Arbitrary)]
struct FuzzBufferInput {
    data: Vec<u8>,
    ops: Vec<Op>,
}

fuzz_target!(|input: FuzzBufferInput| {
    let mut buf = Buffer::from_vec(input.data);
    for op in input.ops {
        let _ = match op {
            Op::U8 => buf.read_u8().map(|_| ()),
            Op::U16 => buf.read_u16_le().map(|_| ()),
            Op::U24 => buf.read_u24_le().map(|_| ()),
            Op::U32 => buf.read_u32_le().map(|_| ()),
            Op::U64 => buf.read_u64_le().map(|_| ()),
            Op::FieldLength => buf.read_field_length().map(|_| ()),
            Op::Length => buf.read_length().map(|_| ()),
            Op::LengthEncodedBytes => buf.read_length_encoded_bytes().map(|_| ()),
            Op::NullTerminated => buf.read_null_terminated_string("utf8mb4").map(|_| ()),
            Op::String(len) => buf.read_string(len as usize, "latin1").map(|_| ()),
            Op::Skip(n) => buf.skip(n as usize),
            Op::Rewind => {
                buf.rewind();
                Ok(())
            }
        };
        assert!(buf.position() <= buf.len());
        assert!(buf.len() <= buf.capacity());
    }
});
