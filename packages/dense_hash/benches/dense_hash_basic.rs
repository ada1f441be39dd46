//! Basic benchmarks for the `dense_hash` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::collections::HashMap;
use std::hint::black_box;
use std::time::Instant;

use alloc_tracker::Allocator;
use criterion::{Criterion, criterion_group, criterion_main};
use dense_hash::{Dictionary, Set};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

const ENTRY_COUNT: usize = 1000;

fn filled() -> Dictionary<usize, usize> {
    let mut dictionary = Dictionary::with_capacity(ENTRY_COUNT).unwrap();
    for key in 0..ENTRY_COUNT {
        dictionary.insert(key, key).unwrap();
    }
    dictionary
}

fn entrypoint(c: &mut Criterion) {
    let allocs = alloc_tracker::Session::new();

    let mut group = c.benchmark_group("dense_hash_basic");

    let mut allocs_op = allocs.operation("fill_pooled");
    group.bench_function("fill_pooled", |b| {
        b.iter_custom(|iters| {
            // Warm up the thread pools so that the measured loop only reuses storage.
            drop(filled());

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(filled()));
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("fill_std");
    group.bench_function("fill_std", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let mut map = HashMap::with_capacity(ENTRY_COUNT);
                for key in 0..ENTRY_COUNT {
                    map.insert(key, key);
                }
                drop(black_box(map));
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("lookup_hit");
    group.bench_function("lookup_hit", |b| {
        b.iter_custom(|iters| {
            let dictionary = filled();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            let mut key = 0;

            for _ in 0..iters {
                black_box(dictionary.get(&black_box(key)).unwrap());
                key = (key + 1) % ENTRY_COUNT;
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("lookup_miss");
    group.bench_function("lookup_miss", |b| {
        b.iter_custom(|iters| {
            let dictionary = filled();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            let mut key = 0;

            for _ in 0..iters {
                black_box(dictionary.get(&black_box(ENTRY_COUNT + key)).unwrap());
                key = (key + 1) % ENTRY_COUNT;
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("remove_reinsert");
    group.bench_function("remove_reinsert", |b| {
        b.iter_custom(|iters| {
            let mut dictionary = filled();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            let mut key = 0;

            for _ in 0..iters {
                let value = dictionary.remove(&black_box(key)).unwrap().unwrap();
                dictionary.insert(key, value).unwrap();
                key = (key + 1) % ENTRY_COUNT;
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("iterate");
    group.bench_function("iterate", |b| {
        b.iter_custom(|iters| {
            let dictionary = filled();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let sum = dictionary
                    .values()
                    .unwrap()
                    .iter()
                    .fold(0_usize, |sum, value| sum.wrapping_add(*value));
                black_box(sum);
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("set_intersect");
    group.bench_function("set_intersect", |b| {
        b.iter_custom(|iters| {
            let evens: Vec<usize> = (0..ENTRY_COUNT).step_by(2).collect();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let mut set: Set<usize> = (0..ENTRY_COUNT).collect();
                set.intersect_with(black_box(&evens)).unwrap();
                drop(black_box(set));
            }

            start.elapsed()
        });
    });

    group.finish();

    allocs.print_to_stdout();
}
