//! ## hotpool-core::alloc::pool
//! **Fixed-size slot pool over arena memory**
//!
//! Slots are laid out contiguously in an [`ArenaRegion`] and linked into a
//! lock-free LIFO free list. A free slot stores the index of the next free slot
//! in its first four bytes; an allocated slot's bytes belong to the caller.
//!
//! The head packs `(generation << 32) | index` into one `AtomicU64`. Every
//! successful CAS bumps the generation, so a head that went `A -> B -> A`
//! between a load and a CAS no longer compares equal. This makes release from
//! a thread other than the acquirer safe.
//!
//! Lock-free, not wait-free: a CAS loop retries until it wins, and some
//! thread always makes progress.

use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use tracing::info;

use super::arena::{ArenaRegion, MemoryArena};
use super::stats::{PoolStats, PoolStatsSnapshot};
use super::CACHE_LINE;
use crate::error::PoolError;

/// Types the pool can hand out: bit-copyable, nothing to drop.
///
/// `Copy` rules out `Drop` impls, so the pool never has to construct or
/// destroy elements on the caller's behalf.
pub trait SlotPayload: Copy + Send + 'static {}

impl<T: Copy + Send + 'static> SlotPayload for T {}

/// End-of-list marker.
const NIL: u32 = u32::MAX;

/// Smallest slot able to hold the free-list link.
const LINK_SIZE: usize = size_of::<AtomicU32>();

#[inline]
fn pack(index: u32, generation: u32) -> u64 {
    (u64::from(generation) << 32) | u64::from(index)
}

#[inline]
fn unpack(head: u64) -> (u32, u32) {
    (head as u32, (head >> 32) as u32)
}

/// Cache-line aligned free-list head to prevent false sharing
#[repr(align(64))]
struct AlignedHead(AtomicU64);

/// A lock-free pool of `capacity` equally sized, cache-line aligned slots.
pub struct FixedSlotPool<'a, T> {
    head: AlignedHead,
    stats: PoolStats,
    base: NonNull<u8>,
    capacity: usize,
    slot_size: usize,
    region: ArenaRegion<'a>,
    _marker: PhantomData<T>,
}

impl<'a, T: SlotPayload> FixedSlotPool<'a, T> {
    /// Builds a pool of `capacity` slots sized for `T`, reserving its footprint from `arena`.
    pub fn new(arena: &'a MemoryArena, capacity: usize) -> Result<Self, PoolError> {
        Self::with_slot_size(arena, capacity, size_of::<T>())
    }

    /// Like [`FixedSlotPool::new`] with a slot size override for extra headroom.
    ///
    /// On failure nothing is reserved, so the arena stays usable by a smaller pool.
    pub fn with_slot_size(
        arena: &'a MemoryArena,
        capacity: usize,
        slot_size: usize,
    ) -> Result<Self, PoolError> {
        let slot_size = Self::slot_layout(capacity, slot_size)?;
        let required = Self::footprint(capacity, slot_size, arena.remaining())?;
        let region = arena
            .reserve(required)
            .ok_or(PoolError::CapacityExceedsArena {
                required,
                available: arena.remaining(),
            })?;
        Ok(Self::build(region, capacity, slot_size))
    }

    /// Builds a pool inside a region the caller carved from an arena.
    pub fn in_region(
        region: ArenaRegion<'a>,
        capacity: usize,
        slot_size: usize,
    ) -> Result<Self, PoolError> {
        let slot_size = Self::slot_layout(capacity, slot_size)?;
        let required = Self::footprint(capacity, slot_size, region.len())?;
        if required > region.len() {
            return Err(PoolError::CapacityExceedsArena {
                required,
                available: region.len(),
            });
        }
        Ok(Self::build(region, capacity, slot_size))
    }

    /// Effective slot size: at least the element and the link, rounded to whole cache lines.
    fn slot_layout(capacity: usize, slot_size: usize) -> Result<usize, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        // NIL is reserved, so the last usable index is NIL - 1.
        if capacity > NIL as usize {
            return Err(PoolError::CapacityTooLarge { capacity });
        }
        if align_of::<T>() > CACHE_LINE {
            return Err(PoolError::UnsupportedAlignment {
                align: align_of::<T>(),
            });
        }
        slot_size
            .max(size_of::<T>())
            .max(LINK_SIZE)
            .checked_next_multiple_of(CACHE_LINE)
            .ok_or(PoolError::CapacityTooLarge { capacity })
    }

    fn footprint(capacity: usize, slot_size: usize, available: usize) -> Result<usize, PoolError> {
        capacity
            .checked_mul(slot_size)
            .ok_or(PoolError::CapacityExceedsArena {
                required: usize::MAX,
                available,
            })
    }

    fn build(region: ArenaRegion<'a>, capacity: usize, slot_size: usize) -> Self {
        let pool = FixedSlotPool {
            head: AlignedHead(AtomicU64::new(pack(NIL, 0))),
            stats: PoolStats::new(),
            base: region.as_ptr(),
            capacity,
            slot_size,
            region,
            _marker: PhantomData,
        };

        // Single-threaded: slot i -> i + 1, last -> NIL, head -> 0.
        for index in 0..capacity as u32 {
            let next = if index as usize + 1 == capacity { NIL } else { index + 1 };
            pool.link(index).store(next, Ordering::Relaxed);
        }
        pool.head.0.store(pack(0, 0), Ordering::Release);

        info!(
            capacity,
            slot_size,
            footprint = capacity * slot_size,
            offset = pool.region.offset(),
            "Fixed slot pool ready"
        );
        pool
    }

    /// Takes one free slot, or `None` when the pool is exhausted.
    ///
    /// The returned storage is uninitialized (or holds whatever its previous
    /// holder left); write a `T` before reading one. Never blocks, never
    /// allocates, never enters the kernel.
    #[inline]
    pub fn acquire(&self) -> Option<NonNull<T>> {
        let mut current = self.head.0.load(Ordering::Acquire);
        loop {
            let (index, generation) = unpack(current);
            if index == NIL {
                self.stats.record_exhausted();
                return None;
            }
            // Another thread may have popped `index` already and be writing its
            // payload; the generation in the CAS below then rejects whatever link
            // value was read here. See `link` for the memory-model caveat.
            let next = self.link(index).load(Ordering::Relaxed);
            match self.head.0.compare_exchange_weak(
                current,
                pack(next, generation.wrapping_add(1)),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.stats.record_acquired();
                    return Some(self.payload(index));
                }
                Err(actual) => {
                    self.stats.record_contended();
                    current = actual;
                }
            }
        }
    }

    /// Takes a free slot and moves `value` into it, releasing on drop.
    #[inline]
    pub fn acquire_with(&self, value: T) -> Option<PooledSlot<'_, 'a, T>> {
        let ptr = self.acquire()?;
        // SAFETY: fresh slot, exclusively ours, sized and aligned for T.
        unsafe { ptr.as_ptr().write(value) };
        Some(PooledSlot { pool: self, ptr })
    }

    /// Returns a slot to the free list.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`FixedSlotPool::acquire`] on this pool and must not
    /// have been released since. The caller must not touch the slot afterwards.
    /// None of this is checked in release builds.
    #[inline]
    pub unsafe fn release(&self, ptr: NonNull<T>) {
        debug_assert!(
            self.contains(ptr.as_ptr()),
            "released pointer does not belong to this pool"
        );
        let index = self.index_of(ptr);
        let link = self.link(index);

        let mut current = self.head.0.load(Ordering::Relaxed);
        loop {
            let (head, generation) = unpack(current);
            link.store(head, Ordering::Relaxed);
            match self.head.0.compare_exchange_weak(
                current,
                pack(index, generation.wrapping_add(1)),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => {
                    self.stats.record_contended();
                    current = actual;
                }
            }
        }
        self.stats.record_released();
    }

    /// Whether `ptr` is the payload address of one of this pool's slots.
    pub fn contains(&self, ptr: *const T) -> bool {
        let offset = (ptr as usize).wrapping_sub(self.base.as_ptr() as usize);
        offset < self.capacity * self.slot_size && offset % self.slot_size == 0
    }

    /// Slot index of a payload pointer handed out by this pool.
    pub fn slot_index(&self, ptr: NonNull<T>) -> Option<usize> {
        self.contains(ptr.as_ptr())
            .then(|| self.index_of(ptr) as usize)
    }

    #[inline]
    fn index_of(&self, ptr: NonNull<T>) -> u32 {
        ((ptr.as_ptr() as usize - self.base.as_ptr() as usize) / self.slot_size) as u32
    }

    #[inline]
    fn slot(&self, index: u32) -> *mut u8 {
        debug_assert!((index as usize) < self.capacity);
        // SAFETY: index < capacity keeps the address inside the region.
        unsafe { self.base.as_ptr().add(index as usize * self.slot_size) }
    }

    #[inline]
    fn payload(&self, index: u32) -> NonNull<T> {
        // SAFETY: slot addresses are derived from a non-null base.
        unsafe { NonNull::new_unchecked(self.slot(index).cast::<T>()) }
    }

    /// The free-list link overlaid on the first bytes of a slot.
    ///
    /// Known hazard: an `acquire` that loses its CAS may load this link after the
    /// winner has handed the slot out and the holder has started a plain write of
    /// its payload over the same bytes. That is a mixed atomic/non-atomic access
    /// the Rust memory model calls a data race. The loaded value is never used,
    /// since the generation in the head makes the CAS fail, and no supported
    /// target tears an aligned 4-byte load. Moving links out of the slots would
    /// remove the race at the cost of `capacity * 4` bytes outside the footprint.
    #[inline]
    fn link(&self, index: u32) -> &AtomicU32 {
        // SAFETY: slots are cache-line aligned and at least LINK_SIZE bytes, and
        // the region outlives `self`. The pool itself only touches links
        // atomically; see the hazard above for overlap with caller payload writes.
        unsafe { &*self.slot(index).cast::<AtomicU32>() }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Bytes of arena memory the slots occupy.
    #[inline]
    pub fn footprint_bytes(&self) -> usize {
        self.capacity * self.slot_size
    }

    /// Slots currently handed out. Exact only at quiescent points.
    #[inline]
    pub fn in_use(&self) -> usize {
        self.stats.in_use() as usize
    }

    /// Slots currently free. Exact only at quiescent points.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.capacity.saturating_sub(self.in_use())
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    pub fn snapshot(&self) -> PoolStatsSnapshot {
        self.stats.snapshot()
    }

    /// Walks the free list. Only meaningful while no other thread touches the pool.
    pub fn count_free_slots(&self) -> usize {
        let (mut index, _) = unpack(self.head.0.load(Ordering::Acquire));
        let mut count = 0;
        while index != NIL && count <= self.capacity {
            count += 1;
            index = self.link(index).load(Ordering::Relaxed);
        }
        count
    }
}

impl<T> std::fmt::Debug for FixedSlotPool<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedSlotPool")
            .field("capacity", &self.capacity)
            .field("slot_size", &self.slot_size)
            .field("region", &self.region)
            .field("stats", &self.stats)
            .finish()
    }
}

// SAFETY: all shared state goes through the atomic head; slot contents are
// owned by whichever thread currently holds the slot.
unsafe impl<T: Send> Send for FixedSlotPool<'_, T> {}
unsafe impl<T: Send> Sync for FixedSlotPool<'_, T> {}

/// An initialized slot that returns itself to its pool on drop.
pub struct PooledSlot<'p, 'a, T: SlotPayload> {
    pool: &'p FixedSlotPool<'a, T>,
    ptr: NonNull<T>,
}

impl<'p, 'a, T: SlotPayload> PooledSlot<'p, 'a, T> {
    /// Stable address of the payload inside the arena.
    #[inline]
    pub fn as_ptr(&self) -> NonNull<T> {
        self.ptr
    }

    /// Gives up the guard without releasing; pair with [`FixedSlotPool::release`].
    #[inline]
    pub fn into_raw(self) -> NonNull<T> {
        let ptr = self.ptr;
        std::mem::forget(self);
        ptr
    }
}

impl<T: SlotPayload> Deref for PooledSlot<'_, '_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: written in acquire_with, exclusively held until drop.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: SlotPayload> DerefMut for PooledSlot<'_, '_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as for Deref; &mut self guarantees uniqueness.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: SlotPayload> Drop for PooledSlot<'_, '_, T> {
    fn drop(&mut self) {
        // SAFETY: the guard is the sole holder of a slot acquired from `pool`.
        unsafe { self.pool.release(self.ptr) }
    }
}

impl<T: SlotPayload + std::fmt::Debug> std::fmt::Debug for PooledSlot<'_, '_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PooledSlot").field(&**self).finish()
    }
}

// SAFETY: the guard owns its slot exclusively; release is safe from any thread.
unsafe impl<T: SlotPayload> Send for PooledSlot<'_, '_, T> {}
unsafe impl<T: SlotPayload + Sync> Sync for PooledSlot<'_, '_, T> {}
