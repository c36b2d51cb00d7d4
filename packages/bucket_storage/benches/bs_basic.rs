//! Basic benchmarks for the `bucket_storage` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::iter;
use std::time::Instant;

use alloc_tracker::Allocator;
use bucket_storage::BucketStorage;
use criterion::{Criterion, criterion_group, criterion_main};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

type TestItem = usize;
const TEST_VALUE: TestItem = 1024;

fn storages(count: u64) -> Vec<BucketStorage<TestItem>> {
    iter::repeat_with(BucketStorage::<TestItem>::new)
        .take(usize::try_from(count).unwrap())
        .collect()
}

fn entrypoint(c: &mut Criterion) {
    let allocs = alloc_tracker::Session::new();

    let mut group = c.benchmark_group("bucket_basic");

    let mut allocs_op = allocs.operation("build_empty");
    group.bench_function("build_empty", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(BucketStorage::<TestItem>::new()));
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("insert_first");
    group.bench_function("insert_first", |b| {
        b.iter_custom(|iters| {
            let mut storages = storages(iters);

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for storage in &mut storages {
                _ = black_box(storage.insert(black_box(TEST_VALUE)));
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("insert_second");
    group.bench_function("insert_second", |b| {
        b.iter_custom(|iters| {
            let mut storages = storages(iters);

            // Pre-warm each storage with one item, so the slab already exists.
            for storage in &mut storages {
                _ = storage.insert(TEST_VALUE);
            }

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for storage in &mut storages {
                _ = black_box(storage.insert(black_box(TEST_VALUE)));
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("read_one");
    group.bench_function("read_one", |b| {
        b.iter_custom(|iters| {
            let mut storage = BucketStorage::<TestItem>::new();
            let cursor = storage.insert(TEST_VALUE);

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                _ = black_box(storage.get(black_box(cursor)));
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("step_forward");
    group.bench_function("step_forward", |b| {
        b.iter_custom(|iters| {
            let mut storage = BucketStorage::<TestItem>::new();
            let first = storage.insert(TEST_VALUE);
            storage.insert(TEST_VALUE);

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                _ = black_box(storage.next(black_box(first)));
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("erase_one");
    group.bench_function("erase_one", |b| {
        b.iter_custom(|iters| {
            let mut storages = storages(iters);

            let cursors = storages
                .iter_mut()
                .map(|storage| storage.insert(TEST_VALUE))
                .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for (storage, cursor) in storages.iter_mut().zip(cursors) {
                // SAFETY: Each cursor is live and used exactly once.
                _ = black_box(unsafe { storage.erase(cursor) });
            }

            start.elapsed()
        });
    });

    group.finish();

    let mut group = c.benchmark_group("bucket_slow");

    let mut allocs_op = allocs.operation("insert_10k");
    group.bench_function("insert_10k", |b| {
        b.iter_custom(|iters| {
            let mut storages = storages(iters);

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for storage in &mut storages {
                for _ in 0..10_000 {
                    _ = black_box(storage.insert(black_box(TEST_VALUE)));
                }
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("forward_10_back_5_times_1000");
    group.bench_function("forward_10_back_5_times_1000", |b| {
        // We add 10 items, erase the first 5 and repeat this 1000 times.
        // This stresses the slot reuse and vacancy bookkeeping.
        b.iter_custom(|iters| {
            let mut storages = storages(iters);

            let mut to_erase = Vec::with_capacity(5);

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for storage in &mut storages {
                for _ in 0..1000 {
                    to_erase.clear();

                    // Add the 5 that we will later erase.
                    for _ in 0..5 {
                        to_erase.push(storage.insert(black_box(TEST_VALUE)));
                    }

                    // Add the 5 that we will keep.
                    for _ in 0..5 {
                        _ = black_box(storage.insert(black_box(TEST_VALUE)));
                    }

                    #[expect(clippy::iter_with_drain, reason = "to reuse the allocation")]
                    for cursor in to_erase.drain(..) {
                        // SAFETY: Each cursor is live and used exactly once.
                        _ = unsafe { storage.erase(cursor) };
                    }
                }
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("iterate_10k");
    group.bench_function("iterate_10k", |b| {
        b.iter_custom(|iters| {
            let storage = iter::repeat_n(TEST_VALUE, 10_000).collect::<BucketStorage<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                _ = black_box(storage.iter().sum::<TestItem>());
            }

            start.elapsed()
        });
    });

    let mut allocs_op = allocs.operation("shrink_to_fit_10k");
    group.bench_function("shrink_to_fit_10k", |b| {
        b.iter_custom(|iters| {
            let mut storages = iter::repeat_with(|| {
                let mut storage = BucketStorage::<TestItem>::new();
                let cursors = iter::repeat_with(|| storage.insert(TEST_VALUE))
                    .take(10_000)
                    .collect::<Vec<_>>();

                // Leave every other slot vacant.
                for cursor in cursors.into_iter().step_by(2) {
                    // SAFETY: Each cursor is live and used exactly once.
                    _ = unsafe { storage.erase(cursor) };
                }

                storage
            })
            .take(usize::try_from(iters).unwrap())
            .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for storage in &mut storages {
                storage.shrink_to_fit();
            }

            start.elapsed()
        });
    });

    group.finish();

    allocs.print_to_stdout();
}
