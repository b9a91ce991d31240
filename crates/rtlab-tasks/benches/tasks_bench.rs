//! Benchmarks for the task crate hot paths.

use criterion::{Criterion, criterion_group, criterion_main};
use rtlab_tasks::{Averager, LoadConfig, LoadSimulator, SequenceRegistry};
use std::hint::black_box;

fn bench_load_integrate(c: &mut Criterion) {
    let Ok(load) = LoadSimulator::new(LoadConfig {
        sub_intervals: 10_000,
        ..LoadConfig::default()
    }) else {
        return;
    };

    c.bench_function("load_integrate_10k", |b| {
        b.iter(|| black_box(load.integrate()));
    });
}

fn bench_averager_push(c: &mut Criterion) {
    let Ok(mut averager) = Averager::new(5) else {
        return;
    };
    let mut sample = 0i32;

    c.bench_function("averager_push", |b| {
        b.iter(|| {
            sample = sample.wrapping_add(7) % 100;
            black_box(averager.push(black_box(sample)))
        });
    });
}

fn bench_registry_increment(c: &mut Criterion) {
    let registry = SequenceRegistry::new(None);

    c.bench_function("registry_increment", |b| {
        b.iter(|| black_box(registry.increment(black_box("bench")).is_ok()));
    });
}

criterion_group!(
    benches,
    bench_load_integrate,
    bench_averager_push,
    bench_registry_increment
);
criterion_main!(benches);
