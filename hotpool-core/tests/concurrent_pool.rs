//! Multi-threaded conservation and exclusivity checks for `FixedSlotPool`.

use std::thread;

use crossbeam::channel;
use hotpool_core::alloc::{ArenaOptions, LocalityPolicy, LockPolicy};
use hotpool_core::{FixedSlotPool, MemoryArena};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, align(64))]
struct Stamp {
    owner: u64,
    seq: u64,
}

fn arena(size: usize) -> MemoryArena {
    MemoryArena::with_options(
        ArenaOptions::new(size, 0)
            .locality(LocalityPolicy::Preferred)
            .lock(LockPolicy::None),
    )
    .unwrap()
}

#[test]
fn owning_threads_conserve_slots() {
    const THREADS: u64 = 4;
    const ROUNDS: u64 = 20_000;
    const CAPACITY: usize = 64;

    let arena = arena(1 << 20);
    let pool = FixedSlotPool::<Stamp>::new(&arena, CAPACITY).unwrap();

    thread::scope(|s| {
        for owner in 0..THREADS {
            let pool = &pool;
            s.spawn(move || {
                let mut held = Vec::with_capacity(CAPACITY);
                for seq in 0..ROUNDS {
                    // Hold up to 8 slots, then give them all back.
                    if let Some(ptr) = pool.acquire() {
                        unsafe { ptr.as_ptr().write(Stamp { owner, seq }) };
                        held.push((ptr, seq));
                    }
                    if held.len() == 8 || seq + 1 == ROUNDS {
                        for (ptr, seq) in held.drain(..) {
                            // Nobody else may have written our slot meanwhile.
                            assert_eq!(unsafe { ptr.as_ptr().read() }, Stamp { owner, seq });
                            unsafe { pool.release(ptr) };
                        }
                    }
                }
            });
        }
    });

    assert_eq!(pool.in_use(), 0);
    assert_eq!(pool.count_free_slots(), CAPACITY);
    let stats = pool.snapshot();
    assert_eq!(stats.acquired, stats.released);
}

#[test]
fn conservation_holds_at_quiescent_point_with_slots_held() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 5;
    const CAPACITY: usize = 32;

    let arena = arena(1 << 16);
    let pool = FixedSlotPool::<Stamp>::new(&arena, CAPACITY).unwrap();

    let held: Vec<Vec<_>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let pool = &pool;
                s.spawn(move || {
                    (0..PER_THREAD)
                        .map(|_| pool.acquire().unwrap().as_ptr() as usize)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let total_held: usize = held.iter().map(Vec::len).sum();
    assert_eq!(pool.count_free_slots() + total_held, CAPACITY);
    assert_eq!(pool.in_use(), total_held);

    let mut all: Vec<_> = held.into_iter().flatten().collect();
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), total_held);
}

#[test]
fn cross_thread_release_through_guards() {
    const CAPACITY: usize = 16;
    const MESSAGES: u64 = 50_000;

    let arena = arena(1 << 16);
    let pool = FixedSlotPool::<Stamp>::new(&arena, CAPACITY).unwrap();
    let (tx, rx) = channel::bounded(CAPACITY);

    thread::scope(|s| {
        let producer_pool = &pool;
        s.spawn(move || {
            let mut seq = 0;
            while seq < MESSAGES {
                match producer_pool.acquire_with(Stamp { owner: 1, seq }) {
                    Some(slot) => {
                        tx.send(slot).unwrap();
                        seq += 1;
                    }
                    None => thread::yield_now(),
                }
            }
        });

        s.spawn(move || {
            let mut expected = 0;
            for slot in rx {
                assert_eq!(slot.seq, expected);
                expected += 1;
                // Dropping the guard releases on the consumer thread.
            }
            assert_eq!(expected, MESSAGES);
        });
    });

    assert_eq!(pool.in_use(), 0);
    assert_eq!(pool.count_free_slots(), CAPACITY);
}
