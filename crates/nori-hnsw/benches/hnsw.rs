//! HNSW benchmarks over the in-memory store.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nori_hnsw::{create_field, HnswConfig, HnswIndex, HnswVectorFieldMetadata, SearchKey};
use nori_kv::{KvEngine, MemKv, WriteBatch};
use nori_vector::{DistanceMetric, VectorType};

const DIMS: u16 = 32;

fn generate_vectors(n: usize, dims: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| (0..dims).map(|j| ((i * j) % 100) as f64 / 100.0).collect())
        .collect()
}

fn build(vectors: &[Vec<f64>]) -> (MemKv, SearchKey) {
    let kv = MemKv::new();
    let sk = SearchKey::new("bench", "idx", "embedding");
    let config = HnswConfig {
        ef_construction: 64,
        ..HnswConfig::default()
    };
    let meta = HnswVectorFieldMetadata::new(DIMS, DistanceMetric::L2, VectorType::Float32, &config);

    let mut batch = WriteBatch::new();
    create_field(&sk, &meta, &mut batch).unwrap();
    kv.write(batch).unwrap();

    let mut index = HnswIndex::open(sk.clone(), &kv).unwrap();
    for (i, vec) in vectors.iter().enumerate() {
        let mut batch = WriteBatch::new();
        index
            .insert_vector_entry(&format!("vec{}", i), vec, &mut batch)
            .unwrap();
        kv.write(batch).unwrap();
    }
    drop(index);
    (kv, sk)
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("hnsw_insert");
    group.sample_size(10);

    for n in [100, 500].iter() {
        let vectors = generate_vectors(*n, DIMS as usize);

        group.bench_with_input(BenchmarkId::from_parameter(n), n, |bencher, _| {
            bencher.iter(|| build(black_box(&vectors)))
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("hnsw_search");

    for n in [500, 2000].iter() {
        let vectors = generate_vectors(*n, DIMS as usize);
        let (kv, sk) = build(&vectors);
        let index = HnswIndex::open(sk, kv.snapshot()).unwrap();

        let query: Vec<f64> = (0..DIMS).map(|i| i as f64 / DIMS as f64).collect();

        group.bench_with_input(BenchmarkId::from_parameter(n), n, |bencher, _| {
            bencher.iter(|| index.knn_search(black_box(&query), 10).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_search);
criterion_main!(benches);
