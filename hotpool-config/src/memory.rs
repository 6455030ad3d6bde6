//! Arena and pool parameters.
//!
//! Everything here is read once at startup; nothing is reloaded at runtime.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

/// Behaviour when the machine offers no locality-domain control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalityMode {
    /// Refuse to start.
    #[default]
    Required,
    /// Fall back to a plain locked region.
    Preferred,
}

/// Which memory gets locked against swapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    #[default]
    All,
    Region,
    None,
}

/// Memory arena reservation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ArenaConfig {
    /// Total reservation in bytes, rounded up to the page size.
    #[serde(default = "default_arena_size")]
    #[validate(range(min = 4096))]
    pub size_bytes: usize,

    /// Locality domain (NUMA node) backing the reservation.
    #[serde(default)]
    #[validate(range(max = 1023))]
    pub domain: u32,

    /// Advise the kernel to back the region with huge pages.
    #[serde(default = "default_true")]
    pub huge_pages: bool,

    #[serde(default)]
    pub locality: LocalityMode,

    #[serde(default)]
    pub lock: LockMode,
}

fn default_arena_size() -> usize {
    32 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            size_bytes: default_arena_size(),
            domain: 0,
            huge_pages: default_true(),
            locality: LocalityMode::default(),
            lock: LockMode::default(),
        }
    }
}

/// Fixed-size slot pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PoolConfig {
    /// Number of slots.
    #[serde(default = "default_capacity")]
    #[validate(custom(function = validation::validate_capacity))]
    pub capacity: usize,

    /// Slot size override in bytes; defaults to the element size.
    #[serde(default)]
    #[validate(range(min = 1, max = 1048576))]
    pub slot_size: Option<usize>,
}

fn default_capacity() -> usize {
    256 * 1024
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            slot_size: None,
        }
    }
}

impl PoolConfig {
    /// Slot size the pool will actually use for elements of `element_size` bytes.
    pub fn effective_slot_size(&self, element_size: usize) -> usize {
        self.slot_size
            .unwrap_or(element_size)
            .max(element_size)
            .max(4)
            .next_multiple_of(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_slot_size_rounds_to_cache_line() {
        let pool = PoolConfig::default();
        assert_eq!(pool.effective_slot_size(64), 64);
        assert_eq!(pool.effective_slot_size(1), 64);

        let pool = PoolConfig {
            slot_size: Some(100),
            ..PoolConfig::default()
        };
        assert_eq!(pool.effective_slot_size(64), 128);
        assert_eq!(pool.effective_slot_size(200), 256);
    }

    #[test]
    fn defaults_validate() {
        ArenaConfig::default().validate().unwrap();
        PoolConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_tiny_arena() {
        let arena = ArenaConfig {
            size_bytes: 100,
            ..ArenaConfig::default()
        };
        assert!(arena.validate().is_err());
    }

    #[test]
    fn capacity_limited_to_slot_index_range() {
        let mut pool = PoolConfig {
            capacity: u32::MAX as usize - 1,
            ..PoolConfig::default()
        };
        pool.validate().unwrap();

        pool.capacity = u32::MAX as usize;
        let errors = pool.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("capacity"));

        pool.capacity = 0;
        assert!(pool.validate().is_err());
    }
}
