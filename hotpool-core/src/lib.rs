//! # hotpool-core
//!
//! Deterministic memory management for fixed-size objects on a latency-critical hot path.
//!
//! ### Expectations (Production):
//! - One arena reservation at startup, locked and prefaulted before the hot path runs
//! - Zero heap allocations and zero syscalls in `acquire`/`release`
//! - Lock-free synchronization primitives
//!
//! ### Key Submodules:
//! - `alloc`: NUMA-local [`MemoryArena`] and the lock-free [`FixedSlotPool`]
//! - `affinity`: CPU to locality-domain mapping and thread pinning
//!
//! ```no_run
//! use hotpool_core::prelude::*;
//!
//! #[derive(Clone, Copy)]
//! #[repr(C, align(64))]
//! struct Tick {
//!     ts_ns: u64,
//!     price: f64,
//! }
//!
//! let arena = MemoryArena::new(1 << 20, 0, true)?;
//! let pool = FixedSlotPool::<Tick>::new(&arena, 1024)?;
//!
//! if let Some(mut tick) = pool.acquire_with(Tick { ts_ns: 0, price: 0.0 }) {
//!     tick.price = 101.25;
//! } // released here
//! # Ok::<(), hotpool_core::error::ConfigurationError>(())
//! ```

pub mod affinity;
pub mod alloc;
pub mod error;

pub mod prelude {
    pub use crate::affinity::{cpu_to_domain, pin_current_thread, AffinityError};
    pub use crate::alloc::*;
    pub use crate::error::*;
}

pub use alloc::{ArenaOptions, FixedSlotPool, MemoryArena, PooledSlot};
pub use error::{ArenaError, ConfigurationError, PoolError};
