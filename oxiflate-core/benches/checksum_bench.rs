//! Performance benchmarks for the checksum implementations.
//!
//! Measures CRC-32 (single-table vs slicing-by-8 crossover) and Adler-32
//! throughput across data sizes.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oxiflate_core::checksum::{Adler32, Checksum, Crc32};
use std::hint::black_box;

/// Reproducible pseudo-random data via a linear congruential generator.
fn random_data(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut seed: u64 = 0x123456789ABCDEF0;
    for _ in 0..size {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        data.push((seed >> 32) as u8);
    }
    data
}

fn bench_crc32(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc32");
    for size in [8usize, 64, 4096, 1 << 20] {
        let data = random_data(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| Crc32::compute(black_box(data)));
        });
    }
    group.finish();
}

fn bench_adler32(c: &mut Criterion) {
    let mut group = c.benchmark_group("adler32");
    for size in [64usize, 4096, 1 << 20] {
        let data = random_data(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| Adler32::compute(black_box(data)));
        });
    }
    group.finish();
}

fn bench_incremental(c: &mut Criterion) {
    let data = random_data(1 << 20);
    c.bench_function("crc32_incremental_4k_chunks", |b| {
        b.iter(|| {
            let mut crc = Crc32::new();
            for chunk in black_box(&data).chunks(4096) {
                crc.update(chunk);
            }
            crc.finalize()
        });
    });
}

criterion_group!(benches, bench_crc32, bench_adler32, bench_incremental);
criterion_main!(benches);
