//! Benchmarks for the near-duplicate detection hot paths.
//!
//! Run with: cargo bench -p harvest-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::DynamicImage;

use harvest_core::dedup::index::LshIndex;
use harvest_core::dedup::{hamming, HashComputer};

fn benchmark_hash_computation(c: &mut Criterion) {
    let computer = HashComputer::new();
    let img = DynamicImage::new_rgb8(1024, 768);

    c.bench_function("perceptual_hash_pair", |b| {
        b.iter(|| {
            let _ = computer.compute_image(black_box(&img));
        })
    });
}

fn benchmark_hamming(c: &mut Criterion) {
    c.bench_function("hamming_distance", |b| {
        b.iter(|| hamming(black_box(0xdead_beef_0123_4567), black_box(0x0123_4567_dead_beef)))
    });
}

fn benchmark_lsh_lookup(c: &mut Criterion) {
    // 10k synthetic hashes spread across buckets via a multiplicative mix
    let mut index = LshIndex::new(8);
    for i in 0..10_000u64 {
        let phash = i.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        index.insert(&format!("img_{i:05}"), phash);
    }

    c.bench_function("lsh_candidates_10k", |b| {
        b.iter(|| {
            let _ = index.candidates(black_box(4242u64.wrapping_mul(0x9e37_79b9_7f4a_7c15)));
        })
    });
}

fn benchmark_lsh_insert(c: &mut Criterion) {
    c.bench_function("lsh_insert", |b| {
        let mut index = LshIndex::new(8);
        let mut i = 0u64;
        b.iter(|| {
            i = i.wrapping_add(1);
            index.insert("img_bench", black_box(i.wrapping_mul(0x9e37_79b9_7f4a_7c15)));
        })
    });
}

criterion_group!(
    benches,
    benchmark_hash_computation,
    benchmark_hamming,
    benchmark_lsh_lookup,
    benchmark_lsh_insert,
);
criterion_main!(benches);
