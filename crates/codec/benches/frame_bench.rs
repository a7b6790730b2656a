//! Frame encode/decode benchmarks across block boundaries.

use std::hint::black_box;

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tokio_util::codec::Decoder;

use tubemq_codec::frame::{FrameCodec, MAX_BLOCK_SIZE, encode_frame};
use tubemq_codec::{Bytes, Codec, RequestBody, RpcCodec, RpcRequest};

const SIZES: [usize; 4] = [64, MAX_BLOCK_SIZE, 4 * MAX_BLOCK_SIZE + 1, 1024 * 1024];

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in SIZES {
        let payload = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| encode_frame(black_box(1), black_box(payload)).unwrap());
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for size in SIZES {
        let frame = encode_frame(1, &vec![0x5Au8; size]).unwrap();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            let mut codec = FrameCodec::new();
            b.iter(|| {
                let mut buf = BytesMut::from(&frame[..]);
                black_box(codec.decode(&mut buf).unwrap().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_request(c: &mut Criterion) {
    let codec = RpcCodec::new();
    let request = RpcRequest {
        request_body: RequestBody {
            method: 1,
            timeout: Some(10_000),
            request: Some(Bytes::from(vec![7u8; 2048])),
        },
        ..Default::default()
    };

    c.bench_function("rpc_encode_request", |b| {
        b.iter(|| codec.encode(black_box(42), black_box(&request)).unwrap());
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_request);
criterion_main!(benches);
