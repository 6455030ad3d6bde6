use hotpool_config::ConfigError;
use hotpool_core::affinity::AffinityError;
use hotpool_core::{ArenaError, PoolError};
use hotpool_telemetry::metrics::MetricsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Arena setup failed: {0}")]
    Arena(#[from] ArenaError),

    #[error("Pool setup failed: {0}")]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Affinity(#[from] AffinityError),

    #[error("Failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Worker thread panicked")]
    WorkerPanicked,
}
