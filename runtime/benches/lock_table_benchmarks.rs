//! Lock table benchmarks
//!
//! Measures the cost of the per-record critical section:
//! - Granting and extending holds
//! - Refusing a contested lock
//! - Status reads and full listings
//! - Throughput with several threads on disjoint and shared seats
//!
//! Run with: `cargo bench`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use seatlock_core::environment::SystemClock;
use seatlock_core::types::seat_grid;
use seatlock_runtime::{LockTable, LockTableConfig};

const ROWS: [char; 10] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J'];

fn table(columns: u32) -> LockTable<SystemClock> {
    let config = LockTableConfig::default().with_eager_expiry(false);
    LockTable::new(seat_grid(&ROWS, columns), SystemClock, config).expect("valid table")
}

fn bench_lock_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock_paths");

    let venue = table(10);
    venue.try_lock("A1", "alice").expect("first lock");

    group.bench_function("extend_own_hold", |b| {
        b.iter(|| venue.try_lock(black_box("A1"), black_box("alice")));
    });

    group.bench_function("refuse_held_by_other", |b| {
        b.iter(|| venue.try_lock(black_box("A1"), black_box("bob")));
    });

    group.bench_function("unknown_resource", |b| {
        b.iter(|| venue.try_lock(black_box("Z99"), black_box("alice")));
    });

    group.bench_function("grant_and_confirm", |b| {
        b.iter_batched(
            || table(1),
            |fresh| {
                let _ = fresh.try_lock("A1", "alice");
                fresh.confirm("A1", "alice")
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("reads");

    for columns in [5u32, 10, 50] {
        let venue = table(columns);
        for seat in venue.resources().step_by(3).map(ToString::to_string).collect::<Vec<_>>() {
            let _ = venue.try_lock(&seat, "alice");
        }
        let size = venue.len();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("list_all", size), &venue, |b, venue| {
            b.iter(|| black_box(venue.list_all()));
        });
    }

    let venue = table(10);
    group.throughput(Throughput::Elements(1));
    group.bench_function("status", |b| {
        b.iter(|| venue.status(black_box("E5")));
    });

    group.finish();
}

fn bench_threads(c: &mut Criterion) {
    let mut group = c.benchmark_group("threads");
    let per_thread = 1_000;

    for (name, shared) in [("disjoint_seats", false), ("shared_seat", true)] {
        let venue = table(10);
        group.throughput(Throughput::Elements(4 * per_thread));
        group.bench_function(name, |b| {
            b.iter(|| {
                std::thread::scope(|scope| {
                    for thread in 0..4 {
                        let venue = &venue;
                        scope.spawn(move || {
                            let seat = if shared { "A1".to_string() } else { format!("B{}", thread + 1) };
                            let holder = format!("holder-{thread}");
                            for _ in 0..per_thread {
                                let _ = black_box(venue.try_lock(&seat, &holder));
                            }
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lock_paths, bench_reads, bench_threads);
criterion_main!(benches);
