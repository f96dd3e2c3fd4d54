//! Benchmarks for distance calculations and candidate lookup.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use markerwatch_geo::{haversine_distance_meters, Coordinate, GridIndex, LinearScan, SpatialIndex};

fn create_test_items(count: usize) -> Vec<(usize, Coordinate)> {
    (0..count)
        .map(|i| {
            // Generate points in a grid around Perm
            let lat = 57.5 + (i as f64 * 0.001) % 1.0;
            let lng = 55.5 + (i as f64 * 0.0007) % 1.5;
            (i, Coordinate::new(lat, lng))
        })
        .collect()
}

fn bench_single_distance(c: &mut Criterion) {
    let moscow = Coordinate::new(55.7558, 37.6173);
    let perm = Coordinate::new(58.010455, 56.229443);

    c.bench_function("haversine_single", |b| {
        b.iter(|| haversine_distance_meters(black_box(&moscow), black_box(&perm)))
    });
}

fn bench_candidate_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("candidates_within_50m");
    let origin = Coordinate::new(58.010455, 56.229443);

    for size in [10, 100, 1000, 10000].iter() {
        let items = create_test_items(*size);

        let mut linear = LinearScan::new();
        linear.rebuild(items.clone());
        let mut grid = GridIndex::new(0.01).expect("valid cell size");
        grid.rebuild(items);

        group.bench_with_input(BenchmarkId::new("linear", size), size, |b, _| {
            b.iter(|| linear.within(black_box(&origin), black_box(50.0)))
        });

        group.bench_with_input(BenchmarkId::new("grid", size), size, |b, _| {
            b.iter(|| grid.within(black_box(&origin), black_box(50.0)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_single_distance, bench_candidate_lookup);
criterion_main!(benches);
