use std::io;

use thiserror::Error;

/// Arena construction failures. The arena is never partially constructed.
#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("Arena size must be greater than zero")]
    ZeroSize,

    #[error("Locality domain {domain} unavailable: {source}")]
    LocalityUnavailable {
        domain: u32,
        #[source]
        source: io::Error,
    },

    #[error("Failed to reserve {bytes} bytes: {source}")]
    OutOfMemory {
        bytes: usize,
        #[source]
        source: io::Error,
    },
}

/// Pool construction failures. Detected before any slot is handed out.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("Pool capacity must be greater than zero")]
    ZeroCapacity,

    #[error("Pool footprint of {required} bytes exceeds the {available} bytes left in the arena")]
    CapacityExceedsArena { required: usize, available: usize },

    #[error("Pool capacity {capacity} exceeds the addressable slot count")]
    CapacityTooLarge { capacity: usize },

    #[error("Element alignment {align} exceeds the cache line size")]
    UnsupportedAlignment { align: usize },
}

/// Any construction-time failure of the arena or a pool built over it.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(transparent)]
    Arena(#[from] ArenaError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}
