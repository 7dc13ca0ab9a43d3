//! Criterion benchmarks for control-protocol framing.
//!
//! Run with:
//! ```bash
//! cargo bench --package lgdisplay-core --bench command_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lgdisplay_core::protocol::{decode_frame, encode_ack, RawCommand};

fn bench_decode_single(c: &mut Criterion) {
    c.bench_function("decode_frame/power_on", |b| {
        b.iter(|| decode_frame(black_box(b"ka 01 01\r")))
    });
}

fn bench_decode_batch(c: &mut Criterion) {
    let batch: Vec<u8> = (0..64u32)
        .flat_map(|i| format!("xb {:02x} A1\r", i % 256).into_bytes())
        .collect();

    c.bench_function("decode_frame/batch_64", |b| {
        b.iter(|| {
            let mut offset = 0;
            while let Ok(Some((_, consumed))) = decode_frame(black_box(&batch[offset..])) {
                offset += consumed;
            }
            offset
        })
    });
}

fn bench_interpret(c: &mut Criterion) {
    let cmd = RawCommand::parse(b"xb 0a D0").unwrap();
    c.bench_function("interpret/input", |b| b.iter(|| black_box(&cmd).interpret()));
}

fn bench_encode_ack(c: &mut Criterion) {
    c.bench_function("encode_ack", |b| {
        b.iter(|| encode_ack(black_box("ka"), black_box(1), true))
    });
}

criterion_group!(
    benches,
    bench_decode_single,
    bench_decode_batch,
    bench_interpret,
    bench_encode_ack
);
criterion_main!(benches);
