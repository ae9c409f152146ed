use beacon_fountain::degree::DegreeSampler;
use beacon_fountain::{Decoder, Encoder, EncoderConfig, Packet};
use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn message(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 131 % 251) as u8).collect()
}

fn config(block_size: usize) -> EncoderConfig {
    EncoderConfig {
        seed: Some(0xBEAC),
        ..EncoderConfig::with_block_size(block_size)
    }
}

/// Degree draws: one binary search over the cumulative table.
fn bench_degree_sampler(c: &mut Criterion) {
    let mut group = c.benchmark_group("degree");
    group.throughput(Throughput::Elements(1));

    for n in [64usize, 1024, 16_384] {
        group.bench_with_input(BenchmarkId::new("next", n), &n, |b, &n| {
            let mut sampler = DegreeSampler::with_seed(n, 0.01, 1).unwrap();
            b.iter(|| black_box(sampler.next()));
        });
    }

    group.finish();
}

/// Encoder hot path: sample, XOR, hash, serialize.
fn bench_encode(c: &mut Criterion) {
    let data = message(1 << 20);

    let mut group = c.benchmark_group("encoder");
    group.throughput(Throughput::Elements(1));

    for block_size in [256usize, 1024] {
        group.bench_with_input(
            BenchmarkId::new("next_packet", block_size),
            &block_size,
            |b, &bs| {
                let mut enc = Encoder::new(data.clone(), &config(bs)).unwrap();
                b.iter(|| {
                    let pkt = enc.next_packet().unwrap();
                    black_box(pkt.encode());
                });
            },
        );
    }

    group.finish();
}

/// Packet parse: header decode plus payload digest check.
fn bench_parse(c: &mut Criterion) {
    let mut enc = Encoder::new(message(64 * 1024), &config(1024)).unwrap();
    let frames: Vec<BytesMut> = (0..256)
        .map(|_| enc.next_packet().unwrap().encode())
        .collect();

    let mut group = c.benchmark_group("wire");
    group.throughput(Throughput::Elements(frames.len() as u64));
    group.bench_function("parse_256", |b| {
        b.iter(|| {
            for frame in &frames {
                black_box(Packet::parse(black_box(frame)).unwrap());
            }
        });
    });
    group.finish();
}

/// Full decode of a 256 KiB message from a pre-encoded stream.
fn bench_decode(c: &mut Criterion) {
    let data = message(256 * 1024);
    let mut enc = Encoder::new(data.clone(), &config(1024)).unwrap();
    let frames: Vec<BytesMut> = (0..2048)
        .map(|_| enc.next_packet().unwrap().encode())
        .collect();

    let mut group = c.benchmark_group("decoder");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.sample_size(20);
    group.bench_function("decode_256k", |b| {
        b.iter(|| {
            let mut dec = Decoder::new();
            let handle = dec.decode();
            for frame in &frames {
                if dec.enqueue(frame).unwrap().done {
                    break;
                }
            }
            black_box(handle)
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_degree_sampler,
    bench_encode,
    bench_parse,
    bench_decode
);
criterion_main!(benches);
