//! Exact ground-truth throughput.
//!
//! Measures brute-force top-N selection per element type and the scaling of
//! the windowed multi-threaded scan.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use annbench::dataset::uniform_vectors;
use annbench::groundtruth::{generate, select_top_n};
use annbench::vecs::VectorSet;
use annbench::{Metric, Vectors};

fn bench_select_top_n(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_top_n");
    let dim = 128;

    for n in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*n as u64));

        let corpus = uniform_vectors(*n, dim, 1).unwrap();
        let bytes: Vectors<u8> = Vectors::from_flat(
            dim,
            corpus.as_flat().iter().map(|&v| (v * 255.0) as u8).collect(),
        )
        .unwrap();
        let query: Vec<f64> = uniform_vectors(1, dim, 2).unwrap().as_flat().iter().map(|&v| v as f64).collect();

        group.bench_with_input(BenchmarkId::new("f32", n), n, |bench, _| {
            let kernel = Metric::SquaredL2.kernel::<f32>();
            bench.iter(|| select_top_n(black_box(&corpus), black_box(&query), kernel, 100).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("u8", n), n, |bench, _| {
            let kernel = Metric::SquaredL2.kernel::<u8>();
            bench.iter(|| select_top_n(black_box(&bytes), black_box(&query), kernel, 100).unwrap());
        });
    }

    group.finish();
}

fn bench_generate_workers(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_workers");
    group.sample_size(10);

    let corpus = VectorSet::F32(uniform_vectors(20_000, 64, 3).unwrap());
    let queries = uniform_vectors(64, 64, 4).unwrap();
    group.throughput(Throughput::Elements(queries.len() as u64));

    for workers in [1, 2, 4, 8].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(workers), workers, |bench, &w| {
            bench.iter(|| generate(&corpus, &queries, Metric::SquaredL2, 10, w).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_select_top_n, bench_generate_workers);
criterion_main!(benches);
