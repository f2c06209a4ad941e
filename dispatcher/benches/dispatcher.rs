use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use std::sync::Arc;
use std::thread;
use txdispatch::Dispatcher;

/// Uncontended acquire/release round trip: no waiter ever enqueues, so this
/// measures pure lock + ledger overhead.
fn bench_uncontended_roundtrip(c: &mut Criterion) {
    let dispatcher = Dispatcher::<u32>::new(64).unwrap();
    c.bench_function("acquire_release_uncontended", |b| {
        b.iter(|| {
            dispatcher.acquire(&1).unwrap();
            dispatcher.release(&1, 1).unwrap();
        })
    });
}

/// Reentrant acquire/release for a single actor climbing to and back down
/// from full capacity, at a few capacities.
fn bench_reentrant_climb(c: &mut Criterion) {
    let mut group = c.benchmark_group("reentrant_climb");
    for capacity in [2u32, 8, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            let dispatcher = Dispatcher::<u32>::new(capacity).unwrap();
            b.iter(|| {
                for _ in 0..capacity {
                    dispatcher.acquire(&1).unwrap();
                }
                dispatcher.release(&1, capacity).unwrap();
            })
        });
    }
    group.finish();
}

/// Several threads contending for a small number of permits, exercising the
/// regular-queue FIFO path rather than the immediate-grant fast path.
fn bench_contended_threads(c: &mut Criterion) {
    c.bench_function("acquire_release_contended_4_threads_2_permits", |b| {
        b.iter(|| {
            let dispatcher = Arc::new(Dispatcher::<u32>::new(2).unwrap());
            let handles: Vec<_> = (0..4u32)
                .map(|actor| {
                    let dispatcher = dispatcher.clone();
                    thread::spawn(move || {
                        for _ in 0..8 {
                            dispatcher.acquire(&actor).unwrap();
                            dispatcher.release(&actor, 1).unwrap();
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
        })
    });
}

/// `try_acquire_exclusive` with a generous budget against a dispatcher that
/// is never actually contended, so the timing reflects the extra timeout
/// bookkeeping rather than any real waiting.
fn bench_try_acquire_exclusive_uncontended(c: &mut Criterion) {
    let dispatcher = Dispatcher::<u32>::new(4).unwrap();
    let mut rng = rand::thread_rng();
    c.bench_function("try_acquire_exclusive_uncontended", |b| {
        b.iter(|| {
            let actor: u32 = rng.gen();
            let granted = dispatcher.try_acquire_exclusive(&actor, std::time::Duration::from_secs(1)).unwrap();
            dispatcher.release(&actor, granted).unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_uncontended_roundtrip,
    bench_reentrant_climb,
    bench_contended_threads,
    bench_try_acquire_exclusive_uncontended
);
criterion_main!(benches);
