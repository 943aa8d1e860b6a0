//! Benchmarks for distance metrics.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nori_vector::DistanceMetric;

fn generate_vectors(dims: usize) -> (Vec<f64>, Vec<f64>) {
    let a: Vec<f64> = (0..dims).map(|i| (i as f64) * 0.1).collect();
    let b: Vec<f64> = (0..dims).map(|i| (i as f64) * 0.2 + 0.5).collect();
    (a, b)
}

fn bench_metric(c: &mut Criterion, name: &str, metric: DistanceMetric) {
    let mut group = c.benchmark_group(name);

    for dims in [128, 256, 512, 768, 1024, 1536].iter() {
        let (a, b) = generate_vectors(*dims);
        group.bench_with_input(BenchmarkId::from_parameter(dims), dims, |bencher, _| {
            bencher.iter(|| metric.distance(black_box(&a), black_box(&b)))
        });
    }

    group.finish();
}

fn bench_l2(c: &mut Criterion) {
    bench_metric(c, "l2_distance", DistanceMetric::L2);
}

fn bench_cosine(c: &mut Criterion) {
    bench_metric(c, "cosine_distance", DistanceMetric::Cosine);
}

fn bench_inner_product(c: &mut Criterion) {
    bench_metric(c, "inner_product_distance", DistanceMetric::InnerProduct);
}

criterion_group!(benches, bench_l2, bench_cosine, bench_inner_product);
criterion_main!(benches);
