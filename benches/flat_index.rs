use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use outfitdb::embedding::{EMBEDDING_DIM, normalized};
use outfitdb::index::FlatIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_vector(rng: &mut StdRng) -> Vec<f32> {
    normalized((0..EMBEDDING_DIM).map(|_| rng.random_range(-1.0..1.0)).collect())
}

fn build_index(n: usize, rng: &mut StdRng) -> FlatIndex {
    let mut index = FlatIndex::new(EMBEDDING_DIM);
    for _ in 0..n {
        index.add(&random_vector(rng)).expect("dimension mismatch");
    }
    index
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_index_search");
    let mut rng = StdRng::seed_from_u64(42);

    for n in [1_000, 10_000, 50_000] {
        let index = build_index(n, &mut rng);
        let query = black_box(random_vector(&mut rng));
        group.bench_with_input(BenchmarkId::from_parameter(n), &index, |b, index| {
            b.iter(|| index.search(&query, 3))
        });
    }

    group.finish();
}

fn bench_add(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let vectors = (0..1_000).map(|_| random_vector(&mut rng)).collect::<Vec<_>>();

    c.bench_function("flat_index_add_1000", |b| {
        b.iter(|| {
            let mut index = FlatIndex::new(EMBEDDING_DIM);
            for v in &vectors {
                index.add(v).expect("dimension mismatch");
            }
            index
        })
    });
}

criterion_group!(benches, bench_search, bench_add);
criterion_main!(benches);
