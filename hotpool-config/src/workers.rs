//! Worker thread layout for the steady-state loop.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

/// Worker threads sharing one pool.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WorkerConfig {
    /// Number of worker threads.
    #[serde(default = "default_threads")]
    #[validate(range(min = 1, max = 1024))]
    pub threads: usize,

    /// CPUs to pin workers to, assigned round-robin. Empty leaves placement to the scheduler.
    #[serde(default)]
    #[validate(custom(function = validation::validate_cpus))]
    pub cpus: Vec<usize>,

    /// Acquire/fill/release cycles per worker.
    #[serde(default = "default_iterations")]
    #[validate(range(min = 1))]
    pub iterations: u64,
}

fn default_threads() -> usize {
    1
}

fn default_iterations() -> u64 {
    1_000_000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            cpus: Vec::new(),
            iterations: default_iterations(),
        }
    }
}

impl WorkerConfig {
    /// CPU for worker `index`, if pinning is configured.
    pub fn cpu_for(&self, index: usize) -> Option<usize> {
        (!self.cpus.is_empty()).then(|| self.cpus[index % self.cpus.len()])
    }
}
