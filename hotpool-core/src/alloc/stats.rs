//! ## hotpool-core::alloc::stats
//! **Pool counters and snapshots**
//!
//! Counters are updated with relaxed atomics alongside the free-list CAS and
//! give an O(1) occupancy estimate. They are exact at quiescent points only.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-pool counters, kept on their own cache line away from the free-list head.
#[derive(Debug, Default)]
#[repr(align(64))]
pub struct PoolStats {
    acquired: AtomicU64,
    released: AtomicU64,
    exhausted: AtomicU64,
    contended: AtomicU64,
}

impl PoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_acquired(&self) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    /// A CAS on the free-list head lost a race (or failed spuriously) and retried.
    #[inline]
    pub(crate) fn record_contended(&self) {
        self.contended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    pub fn exhausted(&self) -> u64 {
        self.exhausted.load(Ordering::Relaxed)
    }

    pub fn contended(&self) -> u64 {
        self.contended.load(Ordering::Relaxed)
    }

    /// Slots currently handed out.
    pub fn in_use(&self) -> u64 {
        // Load releases first so a racing release cannot push the result below zero.
        let released = self.released();
        self.acquired().saturating_sub(released)
    }

    pub fn snapshot(&self) -> PoolStatsSnapshot {
        let released = self.released();
        let acquired = self.acquired();
        PoolStatsSnapshot {
            acquired,
            released,
            exhausted: self.exhausted(),
            contended: self.contended(),
            in_use: acquired.saturating_sub(released),
        }
    }
}

/// Point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    pub acquired: u64,
    pub released: u64,
    pub exhausted: u64,
    pub contended: u64,
    pub in_use: u64,
}

impl PoolStatsSnapshot {
    /// Counter deltas since `earlier`, for periodic reporting.
    pub fn since(&self, earlier: &PoolStatsSnapshot) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            acquired: self.acquired.saturating_sub(earlier.acquired),
            released: self.released.saturating_sub(earlier.released),
            exhausted: self.exhausted.saturating_sub(earlier.exhausted),
            contended: self.contended.saturating_sub(earlier.contended),
            in_use: self.in_use,
        }
    }
}
