use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, measurement::WallTime, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use sprann::clustering::{ModelParams, SparseKMeansModel, SparseKMeansTree, TreeParams};
use sprann::distances::{DenseSparseDistance, SquaredEuclideanDistance};
use sprann::store::{MapPayload, VectorBase};
use sprann::vector::SparseVector;

/// Random sparse vectors with `nnz` nonzero entries each.
fn generate_sparse_data(n: usize, dim: usize, nnz: usize, seed: u64) -> Vec<SparseVector<f64>> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let pairs: Vec<(u32, f64)> = (0..nnz)
                .map(|_| (rng.random_range(0..dim as u32), rng.random_range(0.1..1.0)))
                .collect();
            SparseVector::from_pairs(dim, pairs)
        })
        .collect()
}

fn benchmark_distance_computation(c: &mut Criterion) {
    let data = generate_sparse_data(2, 1024, 32, 42);
    let center = data[0].to_dense();
    let sample = &data[1];

    c.bench_function("distance_computation_euclidean", |b| {
        b.iter(|| {
            SquaredEuclideanDistance.compute(black_box(&center.view()), black_box(sample));
        });
    });
}

fn bench_model_fit(c: &mut Criterion) {
    let data = generate_sparse_data(1000, 256, 16, 42);

    c.bench_function("sparse kmeans fit (1k samples, k=10)", |b| {
        b.iter(|| {
            let mut model = SparseKMeansModel::new(
                ModelParams::new(10)
                    .with_distance(Arc::new(SquaredEuclideanDistance))
                    .with_iterations(20)
                    .with_rng_seed(7),
            );
            model.fit(black_box(&data)).expect("fit failed");
            black_box(model);
        });
    });
}

fn bench_tree_search(c: &mut Criterion) {
    let data = generate_sparse_data(2000, 256, 16, 42);
    let factory = MapPayload::new(Arc::new(VectorBase::new()), 10_000);
    let tree = SparseKMeansTree::new(
        &factory,
        &data,
        TreeParams::new(
            ModelParams::new(4)
                .with_distance(Arc::new(SquaredEuclideanDistance))
                .with_iterations(20)
                .with_rng_seed(7),
            100,
        ),
    )
    .expect("tree build failed");

    c.bench_function("tree leaf search (all queries)", |b| {
        b.iter(|| {
            for query in &data {
                let leaf = tree.search_for_leaf(black_box(query)).expect("search failed");
                black_box(leaf.size());
            }
        });
    });
}

fn criterion_config() -> Criterion<WallTime> {
    Criterion::default().measurement_time(std::time::Duration::new(10, 0))
}

criterion_group!(
    name = benches;
    config = criterion_config();
    targets = benchmark_distance_computation, bench_model_fit, bench_tree_search
);
criterion_main!(benches);
