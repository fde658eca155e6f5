use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use xbee::protocol::{codec, ApiMode, FrameReader, Response};

/// Payload where every fourth byte is reserved, so escaping does real work
fn reserved_heavy(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| if i % 4 == 0 { 0x7D } else { i as u8 })
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    // Typical RF payload
    let small = reserved_heavy(64);
    group.throughput(Throughput::Bytes(64));
    group.bench_function("encode_64b", |b| {
        b.iter(|| black_box(codec::encode(&small).unwrap()));
    });
    group.bench_function("encode_escaped_64b", |b| {
        b.iter(|| black_box(codec::encode_escaped(&small).unwrap()));
    });

    // Largest payload the length field allows
    let large = reserved_heavy(u16::MAX as usize);
    group.throughput(Throughput::Bytes(u16::MAX as u64));
    group.bench_function("encode_escaped_64kb", |b| {
        b.iter(|| black_box(codec::encode_escaped(&large).unwrap()));
    });

    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assembler");

    let wire = codec::encode_escaped(&reserved_heavy(1024)).unwrap();
    group.throughput(Throughput::Bytes(wire.len() as u64));

    group.bench_function("single_read_1kb", |b| {
        b.iter(|| {
            let mut reader = FrameReader::new();
            reader.feed(ApiMode::ApiEnabledEscaped, &wire).unwrap();
            black_box(reader.next_frame().unwrap());
        });
    });

    // Serial ports tend to deliver a handful of bytes per read
    group.bench_function("chunked_reads_1kb", |b| {
        b.iter(|| {
            let mut reader = FrameReader::new();
            for chunk in wire.chunks(16) {
                reader.feed(ApiMode::ApiEnabledEscaped, chunk).unwrap();
            }
            black_box(reader.next_frame().unwrap());
        });
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    let at_response = Bytes::from_static(&[0x88, 0x01, b'D', b'B', 0x00, 0x28]);
    group.bench_function("at_response", |b| {
        b.iter(|| black_box(Response::decode(at_response.clone()).unwrap()));
    });

    let mut receive = vec![0x90];
    receive.extend_from_slice(&0x0013_A200_4052_2BAA_u64.to_be_bytes());
    receive.extend_from_slice(&[0xFF, 0xFE, 0x01]);
    receive.extend_from_slice(&[0u8; 64]);
    let receive = Bytes::from(receive);
    group.bench_function("receive_packet", |b| {
        b.iter(|| black_box(Response::decode(receive.clone()).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_assemble, bench_dispatch);
criterion_main!(benches);
