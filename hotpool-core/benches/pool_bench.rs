#[macro_use]
extern crate criterion;

use criterion::Criterion;

use hotpool_core::alloc::{ArenaOptions, LocalityPolicy, LockPolicy};
use hotpool_core::{FixedSlotPool, MemoryArena};

#[derive(Clone, Copy)]
#[repr(C, align(64))]
struct OrderMsg {
    ts_ns: u64,
    order_id: u64,
    price: f64,
    qty: u32,
}

fn bench_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_acquire_release");

    for capacity in [128, 16384, 262144] {
        let arena = MemoryArena::with_options(
            ArenaOptions::new(capacity * 64, 0)
                .locality(LocalityPolicy::Preferred)
                .lock(LockPolicy::None),
        )
        .unwrap();
        let pool = FixedSlotPool::<OrderMsg>::new(&arena, capacity).unwrap();

        group.throughput(criterion::Throughput::Elements(1));
        group.bench_function(format!("capacity_{}", capacity), |b| {
            b.iter(|| {
                let slot = pool.acquire().unwrap();
                unsafe {
                    slot.as_ptr().write(OrderMsg {
                        ts_ns: 1,
                        order_id: 42,
                        price: 101.25,
                        qty: 10,
                    });
                    pool.release(criterion::black_box(slot));
                }
            });
        });
    }
    group.finish();
}

fn bench_guard(c: &mut Criterion) {
    let arena = MemoryArena::with_options(
        ArenaOptions::new(1 << 20, 0)
            .locality(LocalityPolicy::Preferred)
            .lock(LockPolicy::None),
    )
    .unwrap();
    let pool = FixedSlotPool::<u64>::new(&arena, 1024).unwrap();

    c.bench_function("pooled_slot_guard", |b| {
        b.iter(|| {
            let slot = pool.acquire_with(criterion::black_box(7)).unwrap();
            criterion::black_box(*slot);
        });
    });
}

criterion_group!(benches, bench_acquire_release, bench_guard);
criterion_main!(benches);
