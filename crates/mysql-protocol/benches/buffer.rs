//! Benchmarks for buffer primitives and frame headers.

#![allow(clippy::unwrap_used, missing_docs)]

use bytes::BytesMut;
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use mysql_protocol::{Buffer, FrameHeader, ServerMessage, ServerMessageType};

/// Benchmark writing into a reused buffer (no reallocation).
fn bench_reused_buffer_write(c: &mut Criterion) {
    let mut buf = Buffer::with_capacity(4096);

    c.bench_function("buffer_write_reused", |b| {
        b.iter(|| {
            buf.clear();
            for i in 0..64u64 {
                buf.write_length_encoded(i * 1_000);
                buf.write_u32_le(i as u32);
            }
            black_box(buf.len())
        })
    });
}

/// Benchmark writing into a buffer that has to grow.
fn bench_growing_buffer_write(c: &mut Criterion) {
    let payload = vec![0xA5u8; 1024];
    let mut group = c.benchmark_group("buffer_write_growing");
    group.throughput(Throughput::Bytes(64 * payload.len() as u64));
    group.bench_function("64x1KiB", |b| {
        b.iter(|| {
            let mut buf = Buffer::with_capacity(16);
            for _ in 0..64 {
                buf.write_length_encoded_bytes(&payload);
            }
            black_box(buf)
        })
    });
    group.finish();
}

/// Benchmark decoding a row of length-encoded values.
fn bench_row_decode(c: &mut Criterion) {
    let mut buf = Buffer::with_capacity(1024);
    for i in 0..32 {
        if i % 5 == 0 {
            buf.write_null();
        } else {
            buf.write_length_encoded_string("some column value", "utf8mb4")
                .unwrap();
        }
    }
    let row = buf.freeze();

    c.bench_function("buffer_row_decode", |b| {
        b.iter(|| {
            let mut read = Buffer::from(row.clone());
            let mut count = 0;
            while read.remaining() > 0 {
                if read.read_length_encoded_bytes().unwrap().is_some() {
                    count += 1;
                }
            }
            black_box(count)
        })
    });
}

/// Benchmark frame header decoding.
fn bench_frame_header_decode(c: &mut Criterion) {
    let mut encoded = BytesMut::new();
    ServerMessage::empty(ServerMessageType::Row)
        .encode(&mut encoded)
        .unwrap();
    let encoded = encoded.freeze();

    c.bench_function("frame_header_decode", |b| {
        b.iter(|| {
            let mut cursor = encoded.clone();
            black_box(FrameHeader::decode(&mut cursor, usize::MAX).unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_reused_buffer_write,
    bench_growing_buffer_write,
    bench_row_decode,
    bench_frame_header_decode,
);
criterion_main!(benches);
