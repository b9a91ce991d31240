//! Benchmarks for the synchronization crate.

use criterion::{Criterion, criterion_group, criterion_main};
use rtlab_sync::{Guarded, Handoff, Semaphore};
use std::hint::black_box;

fn bench_uncontended_acquire_release(c: &mut Criterion) {
    let sem = Semaphore::binary("bench", true);

    c.bench_function("semaphore_acquire_release", |b| {
        b.iter(|| {
            if sem.try_acquire() {
                black_box(sem.release());
            }
        });
    });
}

fn bench_guarded_increment(c: &mut Criterion) {
    let counter = Guarded::new("bench", 0u64);

    c.bench_function("guarded_increment", |b| {
        b.iter(|| {
            if let Ok(mut value) = counter.lock() {
                *value = black_box(value.wrapping_add(1));
            }
        });
    });
}

fn bench_latest_publish_receive(c: &mut Criterion) {
    let link = Handoff::latest("bench", None);

    c.bench_function("handoff_publish_receive", |b| {
        b.iter(|| {
            black_box(link.publish(black_box(42u32)).is_ok());
            black_box(link.try_receive());
        });
    });
}

criterion_group!(
    benches,
    bench_uncontended_acquire_release,
    bench_guarded_increment,
    bench_latest_publish_receive,
);

criterion_main!(benches);
