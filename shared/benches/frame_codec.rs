use std::io::{self, Read, Write};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shared::{frame::encode_frame, FrameCodec};

const KB: usize = 1024;

/// Echoes back everything written to it, like a round-trip receiver with
/// zero network latency.
struct Loop {
    buffer: Vec<u8>,
    position: usize,
}

impl Read for Loop {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = (&self.buffer[self.position..]).read(buf)?;
        self.position += count;
        Ok(count)
    }
}

impl Write for Loop {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn frame_codec_benchmark(c: &mut Criterion) {
    let codec = FrameCodec::default();
    let mut group = c.benchmark_group("frame codec");

    for payload_size in (0..=5).map(|i| KB << (i * 2)) {
        let payload = vec![0x5Au8; payload_size];
        group.throughput(criterion::Throughput::Bytes(payload_size as u64));

        group.bench_with_input(BenchmarkId::new("encode", payload_size), &payload, |b, payload| {
            b.iter(|| encode_frame(black_box(payload)).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("write then read", payload_size), &payload, |b, payload| {
            let mut wire = Loop {
                buffer: Vec::with_capacity(payload_size + 4),
                position: 0,
            };

            b.iter(|| {
                wire.buffer.clear();
                wire.position = 0;
                codec.write_frame(&mut wire, black_box(payload)).unwrap();
                black_box(codec.read_frame(&mut wire).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, frame_codec_benchmark);
criterion_main!(benches);
