//! ## hotpool-telemetry::logging
//! **`tracing` subscriber setup**
//!
//! `RUST_LOG` wins over the configured level so operators can raise verbosity
//! for a single run without touching config files.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global fmt subscriber.
///
/// Returns `false` when a subscriber was already installed; the existing one
/// keeps receiving events.
pub fn init_logging(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(false)
        .try_init()
    {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "Subscriber already installed, keeping it");
            false
        }
    }
}

/// Logs a locality or pinning failure; these degrade latency, not correctness.
pub fn log_degraded(what: &str, error: &dyn std::error::Error) {
    tracing::warn!(error = %error, "{} failed, continuing without it", what);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn degraded_features_are_logged() {
        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        log_degraded("Thread pinning", &err);
        assert!(logs_contain("Thread pinning failed"));
    }

    #[traced_test]
    #[test]
    fn second_subscriber_is_reported() {
        // The test harness subscriber is already global here.
        assert!(!init_logging("debug"));
        assert!(logs_contain("Subscriber already installed"));
    }
}
