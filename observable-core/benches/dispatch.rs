//! Benchmarks for observable-core
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use observable_core::{Observable, Value};

fn observable_with_watchers(watchers: usize) -> Observable {
    let observable = Observable::from_fields([("a", 0), ("b", 0), ("c", 0)]).unwrap();
    for _ in 0..watchers {
        // Kept registered for the lifetime of the observable.
        let _ = observable.watch_fn("a", |changes| {
            black_box(changes.len());
        });
    }
    let _ = observable.watch_all_fn(|changes| {
        black_box(changes.len());
    });
    observable
}

// =============================================================================
// WRITE BENCHMARKS
// =============================================================================

fn bench_set_same_value(c: &mut Criterion) {
    let observable = observable_with_watchers(1);
    c.bench_function("set_same_value", |b| {
        b.iter(|| observable.set("a", black_box(0)).unwrap())
    });
}

fn bench_set_immediate(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_immediate");
    for watchers in [1, 10, 100] {
        let observable = observable_with_watchers(watchers);
        let mut next = 0i64;
        group.bench_with_input(BenchmarkId::from_parameter(watchers), &watchers, |b, _| {
            b.iter(|| {
                next += 1;
                observable.set("a", black_box(next)).unwrap()
            })
        });
    }
    group.finish();
}

// =============================================================================
// BATCH BENCHMARKS
// =============================================================================

fn bench_batch_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_flush");
    for watchers in [1, 10, 100] {
        let observable = observable_with_watchers(watchers);
        let mut next = 0i64;
        group.bench_with_input(BenchmarkId::from_parameter(watchers), &watchers, |b, _| {
            b.iter(|| {
                observable.batch(|| {
                    for key in ["a", "b", "c", "a"] {
                        next += 1;
                        observable.set(key, Value::Int(next)).unwrap();
                    }
                })
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_set_same_value, bench_set_immediate, bench_batch_flush);
criterion_main!(benches);
