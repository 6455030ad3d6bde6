//! # Hotpool Telemetry
//!
//! Logging initialisation and Prometheus metrics for arena/pool occupancy.
//! Nothing in here runs on the acquire/release hot path.

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{MetricsRecorder, PoolObservation};
