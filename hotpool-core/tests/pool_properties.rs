//! Property tests for slot exclusivity, exhaustion and recovery.

use std::collections::HashSet;
use std::ptr::NonNull;

use hotpool_core::alloc::{ArenaOptions, LocalityPolicy, LockPolicy, CACHE_LINE};
use hotpool_core::{FixedSlotPool, MemoryArena};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Acquire,
    Release(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Acquire),
        2 => any::<usize>().prop_map(Op::Release),
    ]
}

fn arena() -> MemoryArena {
    MemoryArena::with_options(
        ArenaOptions::new(1 << 16, 0)
            .locality(LocalityPolicy::Preferred)
            .lock(LockPolicy::None),
    )
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn acquired_slots_are_exclusive(capacity in 1usize..48, ops in prop::collection::vec(op(), 0..400)) {
        let arena = arena();
        let pool = FixedSlotPool::<[u64; 4]>::new(&arena, capacity).unwrap();
        let mut held: Vec<NonNull<[u64; 4]>> = Vec::new();

        for op in ops {
            match op {
                Op::Acquire => match pool.acquire() {
                    Some(ptr) => {
                        prop_assert!(held.len() < capacity);
                        prop_assert!(!held.contains(&ptr));
                        prop_assert_eq!(ptr.as_ptr() as usize % CACHE_LINE, 0);
                        held.push(ptr);
                    }
                    None => prop_assert_eq!(held.len(), capacity),
                },
                Op::Release(i) if !held.is_empty() => {
                    let ptr = held.swap_remove(i % held.len());
                    unsafe { pool.release(ptr) };
                }
                Op::Release(_) => {}
            }
            prop_assert_eq!(pool.in_use(), held.len());
        }
        prop_assert_eq!(pool.count_free_slots(), capacity - held.len());
    }

    #[test]
    fn released_slot_comes_back(capacity in 1usize..48, pick in any::<usize>()) {
        let arena = arena();
        let pool = FixedSlotPool::<u32>::new(&arena, capacity).unwrap();

        let all: Vec<_> = std::iter::from_fn(|| pool.acquire()).collect();
        prop_assert_eq!(all.len(), capacity);
        let distinct: HashSet<_> = all.iter().map(|p| p.as_ptr() as usize).collect();
        prop_assert_eq!(distinct.len(), capacity);

        let victim = all[pick % capacity];
        unsafe { pool.release(victim) };
        let again: Vec<_> = std::iter::from_fn(|| pool.acquire()).collect();
        prop_assert_eq!(again, vec![victim]);
    }
}
