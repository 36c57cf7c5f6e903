//! Performance benchmarks for wsync.
//!
//! Run with: `cargo bench`

use std::io::Cursor;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use wsync::protocol::assembler::MessageAssembler;
use wsync::protocol::frame::{DecodeOptions, Frame};
use wsync::protocol::handshake::{HandshakeRequest, HandshakeResponse, compute_accept_key};
use wsync::protocol::mask::{apply_mask, apply_mask_fast};
use wsync::protocol::utf8::{self, Utf8Validator};
use wsync::protocol::OpCode;
use wsync::Limits;

fn encoded_frame(payload_size: usize, mask: Option<[u8; 4]>) -> Vec<u8> {
    let frame = Frame::binary(vec![0xAB; payload_size]);
    let mut buf = Vec::with_capacity(frame.wire_size(mask.is_some()));
    frame.encode(&mut buf, mask);
    buf
}

// =============================================================================
// Frame Codec Benchmarks
// =============================================================================

fn bench_frame_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_codec");
    let mask = Some([0x37, 0xfa, 0x21, 0x3d]);

    for (name, size) in [("10b", 10), ("1kb", 1024), ("64kb", 65536)] {
        let unmasked = encoded_frame(size, None);
        let masked = encoded_frame(size, mask);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_function(format!("parse_{name}_unmasked"), |b| {
            b.iter(|| Frame::parse(black_box(&unmasked)))
        });
        group.bench_function(format!("parse_{name}_masked"), |b| {
            b.iter(|| Frame::parse(black_box(&masked)))
        });
        group.bench_function(format!("read_from_{name}_masked"), |b| {
            b.iter(|| {
                Frame::read_from(&mut Cursor::new(black_box(&masked)), &DecodeOptions::default())
            })
        });

        let frame = Frame::binary(vec![0xAB; size]);
        group.bench_function(format!("encode_{name}_masked"), |b| {
            let mut out = Vec::with_capacity(frame.wire_size(true));
            b.iter(|| {
                out.clear();
                frame.encode(&mut out, black_box(mask));
            })
        });
    }

    group.finish();
}

// =============================================================================
// Masking Benchmarks
// =============================================================================

fn bench_masking(c: &mut Criterion) {
    let mut group = c.benchmark_group("masking");
    let mask = [0x37, 0xfa, 0x21, 0x3d];

    for (name, size) in [("64b", 64), ("64kb", 65536), ("1mb", 1024 * 1024)] {
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_function(format!("apply_mask_{name}"), |b| {
            let mut data = vec![0xAB; size];
            b.iter(|| apply_mask(black_box(&mut data), mask))
        });
        group.bench_function(format!("apply_mask_fast_{name}"), |b| {
            let mut data = vec![0xAB; size];
            b.iter(|| apply_mask_fast(black_box(&mut data), mask))
        });
    }

    group.finish();
}

// =============================================================================
// UTF-8 Benchmarks
// =============================================================================

fn bench_utf8(c: &mut Criterion) {
    let mut group = c.benchmark_group("utf8");

    let ascii = "a".repeat(64 * 1024);
    let mixed = "héllo wörld ✓ 😀 ".repeat(3000);

    for (name, text) in [("ascii_64kb", &ascii), ("mixed", &mixed)] {
        group.throughput(Throughput::Bytes(text.len() as u64));

        group.bench_function(format!("validate_{name}"), |b| {
            b.iter(|| utf8::validate_utf8(black_box(text.as_bytes())))
        });
        group.bench_function(format!("incremental_{name}"), |b| {
            b.iter(|| {
                let mut validator = Utf8Validator::new();
                let mut chunks = text.as_bytes().chunks(1000).peekable();
                while let Some(chunk) = chunks.next() {
                    validator.validate(chunk, chunks.peek().is_none()).unwrap();
                }
            })
        });
        group.bench_function(format!("deserialize_{name}"), |b| {
            let mut points = Vec::with_capacity(text.len());
            b.iter(|| {
                points.clear();
                utf8::deserialize(black_box(text.as_bytes()), Some(&mut points))
            })
        });
    }

    group.finish();
}

// =============================================================================
// Handshake Benchmarks
// =============================================================================

fn bench_handshake(c: &mut Criterion) {
    let mut group = c.benchmark_group("handshake");

    let key = "dGhlIHNhbXBsZSBub25jZQ==";
    group.bench_function("compute_accept_key", |b| {
        b.iter(|| compute_accept_key(black_box(key)))
    });

    let request = b"GET /chat HTTP/1.1\r\n\
        Host: server.example.com\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\
        Origin: http://example.com\r\n\
        Sec-WebSocket-Protocol: chat, superchat\r\n\
        \r\n";
    let supported = vec!["superchat".to_string()];

    group.bench_function("parse_request", |b| {
        b.iter(|| HandshakeRequest::parse(black_box(request)))
    });

    group.bench_function("full_server_handshake", |b| {
        b.iter(|| {
            let req = HandshakeRequest::parse(black_box(request)).unwrap();
            req.validate().unwrap();
            let resp = HandshakeResponse::from_request(&req, &supported);
            let mut buf = Vec::with_capacity(256);
            resp.write(&mut buf).unwrap();
            black_box(buf)
        })
    });

    let response = b"HTTP/1.1 101 Switching Protocols\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\
        Sec-WebSocket-Protocol: chat\r\n\
        \r\n";

    group.bench_function("parse_response", |b| {
        b.iter(|| HandshakeResponse::parse(black_box(response)))
    });

    group.finish();
}

// =============================================================================
// Message Reassembly Benchmarks
// =============================================================================

fn bench_reassembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassembly");
    group.throughput(Throughput::Bytes(65536));

    group.bench_function("single_frame_64kb", |b| {
        b.iter(|| {
            let mut assembler = MessageAssembler::new(Limits::default());
            assembler.push(Frame::binary(vec![0xAB; 65536])).unwrap()
        })
    });

    group.bench_function("16_text_fragments_64kb", |b| {
        b.iter(|| {
            let mut assembler = MessageAssembler::new(Limits::default());
            for i in 0..16 {
                let opcode = if i == 0 {
                    OpCode::Text
                } else {
                    OpCode::Continuation
                };
                let done = assembler
                    .push(Frame::new(i == 15, opcode, vec![b'x'; 4096]))
                    .unwrap();
                if done.is_some() {
                    return done;
                }
            }
            None
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_codec,
    bench_masking,
    bench_utf8,
    bench_handshake,
    bench_reassembly
);

criterion_main!(benches);
