//! # Hotpool Configuration System
//!
//! Layered startup configuration for the arena, its pools and the worker threads
//! that use them. Loaded once before the hot path starts; never reloaded.
//!
//! ## Features
//! - **Layering**: defaults, YAML files, then `HOTPOOL_*` environment variables
//! - **Validation**: field ranges via `validator`, plus a pool-vs-arena footprint check

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use hotpool_core::alloc::page_size;
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod memory;
mod telemetry;
mod validation;
mod workers;

pub use error::ConfigError;
pub use memory::{ArenaConfig, LocalityMode, LockMode, PoolConfig};
pub use telemetry::TelemetryConfig;
pub use workers::WorkerConfig;

const BASE_FILE: &str = "config/hotpool.yaml";
const ENV_PREFIX: &str = "HOTPOOL_";

/// Top‑level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct HotpoolConfig {
    /// Arena reservation (size, locality domain, paging policy).
    #[validate(nested)]
    #[serde(default)]
    pub arena: ArenaConfig,

    /// Slot pool sizing.
    #[validate(nested)]
    #[serde(default)]
    pub pool: PoolConfig,

    /// Worker threads and their CPU placement.
    #[validate(nested)]
    #[serde(default)]
    pub workers: WorkerConfig,

    /// Logging and metrics.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl HotpoolConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/hotpool.yaml`, if present
    /// 3. `config/<HOTPOOL_ENV>.yaml`, if present (`HOTPOOL_ENV` defaults to `production`)
    /// 4. `HOTPOOL_*` environment variables, `__` separating nested keys
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(HotpoolConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        let env = std::env::var("HOTPOOL_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load configuration from a specific file, with environment overrides on top.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::extract(
            Figment::from(Serialized::defaults(HotpoolConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects a pool that could never fit the arena, before anything is reserved.
    ///
    /// Compares against the page-rounded size the arena will actually reserve.
    pub fn check_footprint(&self, element_size: usize) -> Result<(), ConfigError> {
        let slot = self.pool.effective_slot_size(element_size);
        let required = self.pool.capacity.saturating_mul(slot);
        let available = self
            .arena
            .size_bytes
            .checked_next_multiple_of(page_size())
            .unwrap_or(usize::MAX);
        if required > available {
            return Err(ConfigError::Footprint {
                required,
                available,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn full_config_validation() {
        let config = HotpoolConfig::default();
        config.validate().expect("Default config should validate");
        config.check_footprint(64).unwrap();
    }

    #[test]
    fn file_then_environment_override() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/hotpool.yaml",
                r#"
arena:
  size_bytes: 1048576
  domain: 0
  locality: preferred
  lock: none
pool:
  capacity: 10
"#,
            )?;
            jail.set_env("HOTPOOL_POOL__CAPACITY", "100");

            let config = HotpoolConfig::load().expect("config loads");
            assert_eq!(config.arena.size_bytes, 1 << 20);
            assert_eq!(config.arena.locality, LocalityMode::Preferred);
            assert_eq!(config.arena.lock, LockMode::None);
            assert!(config.arena.huge_pages);
            assert_eq!(config.pool.capacity, 100);
            Ok(())
        });
    }

    #[test]
    fn environment_file_overrides_base() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file("config/hotpool.yaml", "pool:\n  capacity: 10\n")?;
            jail.create_file("config/staging.yaml", "pool:\n  capacity: 20\n")?;
            jail.set_env("HOTPOOL_ENV", "staging");

            let config = HotpoolConfig::load().expect("config loads");
            assert_eq!(config.pool.capacity, 20);
            Ok(())
        });
    }

    #[test]
    fn load_from_missing_path() {
        assert!(matches!(
            HotpoolConfig::load_from_path("does/not/exist.yaml"),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "bad.yaml",
                "pool:\n  capacity: 0\ntelemetry:\n  log_level: loud\n",
            )?;
            let err = HotpoolConfig::load_from_path("bad.yaml").unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)));
            Ok(())
        });
    }

    #[test]
    fn unknown_mode_is_a_parse_error() {
        Jail::expect_with(|jail| {
            jail.create_file("bad.yaml", "arena:\n  lock: sometimes\n")?;
            let err = HotpoolConfig::load_from_path("bad.yaml").unwrap_err();
            assert!(matches!(err, ConfigError::Parsing(_)));
            Ok(())
        });
    }

    #[test]
    fn footprint_check_matches_pool_rule() {
        let mut config = HotpoolConfig::default();
        config.arena.size_bytes = 4096;
        config.pool.capacity = 100;
        assert!(matches!(
            config.check_footprint(64),
            Err(ConfigError::Footprint {
                required: 6400,
                available: 4096
            })
        ));

        config.pool.capacity = 64;
        config.check_footprint(64).unwrap();
    }

    #[test]
    fn footprint_uses_page_rounded_arena_size() {
        let page = page_size();
        let mut config = HotpoolConfig::default();
        config.arena.size_bytes = page + 904;
        config.pool.capacity = (page + 904) / 64 + 1;
        config.check_footprint(64).unwrap();

        config.pool.capacity = 2 * page / 64 + 1;
        assert!(matches!(
            config.check_footprint(64),
            Err(ConfigError::Footprint { available, .. }) if available == 2 * page
        ));
    }
}
