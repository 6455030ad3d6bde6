//! ## hotpool-core::alloc
//! **Arena reservation and fixed-size slot pools**
//!
//! ### Expectations (Production):
//! - Zero heap allocations in acquire/release paths
//! - Constant-time acquire/release independent of capacity
//! - Cache-line aligned slots, no false sharing on the free-list head
//!
//! ### Key Submodules:
//! - `arena/`: NUMA-local, locked, prefaulted memory region
//! - `pool/`: Lock-free free list of cache-line aligned slots
//! - `stats/`: Pool counters and snapshots
//! - `sys/`: Thin wrappers over the OS memory facilities

pub mod arena;
pub mod pool;
pub mod stats;
mod sys;

pub use arena::{ArenaOptions, ArenaRegion, LocalityPolicy, LockPolicy, MemoryArena};
pub use pool::{FixedSlotPool, PooledSlot, SlotPayload};
pub use stats::{PoolStats, PoolStatsSnapshot};

/// Size of a cache line on every target this crate is tuned for.
pub const CACHE_LINE: usize = 64;

/// Returns the system page size in bytes.
pub fn page_size() -> usize {
    sys::page_size()
}
