//! Benchmark for scene rendering.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trueno_gg::prelude::*;

fn dataset(size: usize) -> DataFrame {
    let x: Vec<f32> = (0..size).map(|i| i as f32 / size as f32 * 10.0).collect();
    let y: Vec<f32> = x.iter().map(|v| v.sin() * 3.0 + v).collect();
    let g: Vec<&str> = (0..size).map(|i| ["a", "b", "c"][i % 3]).collect();
    let mut df = DataFrame::new();
    df.add_column_f32("x", &x).unwrap();
    df.add_column_f32("y", &y).unwrap();
    df.add_column_str("g", &g).unwrap();
    df
}

fn point_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("point_plot");

    for size in [100, 1_000, 10_000, 100_000] {
        let plot = GGPlot::new(dataset(size), Aes::xy("x", "y").colour("g"))
            .geom(Geom::point())
            .facet(FacetSpec::wrap("g"));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(&plot).render().unwrap());
        });
    }

    group.finish();
}

fn smooth_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("smooth_plot");

    // Loess below the large-sample threshold, gam above it.
    for size in [100, 900, 3_000] {
        let plot = GGPlot::new(dataset(size), Aes::xy("x", "y")).geom(Geom::smooth());

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(&plot).render().unwrap());
        });
    }

    group.finish();
}

fn histogram_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("histogram_plot");

    for size in [1_000, 100_000] {
        let plot = GGPlot::new(dataset(size), Aes::new().x("y").fill("g")).geom(Geom::histogram());

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(&plot).render().unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, point_benchmark, smooth_benchmark, histogram_benchmark);
criterion_main!(benches);
