use criterion::{black_box, criterion_group, criterion_main, Criterion};
use recgif::lzw::Compressor;
use recgif::neuquant::quantize;
use recgif::sink::ByteSink;
use recgif::{Builder, Threading};

/// Deterministic noisy RGBA pixels
fn noise(len: usize) -> Vec<u8> {
    let mut seed = 0x1234_5678u32;
    (0..len)
        .map(|_| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (seed >> 16) as u8
        })
        .collect()
}

fn quantize_frame(crit: &mut Criterion) {
    let rgb = noise(128 * 128 * 3);
    crit.bench_function("quantize_128", |b| {
        b.iter(|| quantize(black_box(&rgb), 10))
    });
}

fn compress_frame(crit: &mut Criterion) {
    let indices = noise(256 * 256);
    crit.bench_function("compress_256", |b| {
        b.iter(|| {
            let mut sink = ByteSink::with_capacity(1 << 16);
            Compressor::new(8)
                .compress(black_box(&indices), &mut sink)
                .unwrap();
        })
    });
}

fn encode_frames(crit: &mut Criterion) {
    let frames: Vec<Vec<u8>> = (0..4).map(|_| noise(64 * 64 * 4)).collect();
    crit.bench_function("encode_4_frames", |b| {
        b.iter(|| {
            let mut writer = Builder::default()
                .with_width(64)
                .with_height(64)
                .with_threading(Threading::Inline)
                .build()
                .unwrap();
            for f in &frames {
                writer.encode_frame(black_box(f.clone())).unwrap();
            }
            writer.finish().unwrap()
        })
    });
}

criterion_group!(benches, quantize_frame, compress_frame, encode_frames);
criterion_main!(benches);
