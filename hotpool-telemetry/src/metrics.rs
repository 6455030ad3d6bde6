//! ## hotpool-telemetry::metrics
//! **Prometheus exporter for pool occupancy**
//!
//! The hot path only bumps the pool's own relaxed counters. This recorder
//! copies them into Prometheus types at reporting points.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Exposition output is not UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Pool counters as seen at one reporting point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolObservation {
    pub capacity: u64,
    pub in_use: u64,
    pub acquired: u64,
    pub released: u64,
    pub exhausted: u64,
    pub contended: u64,
}

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub capacity: IntGauge,
    pub in_use: IntGauge,
    pub arena_bytes: IntGauge,
    pub acquired: IntCounter,
    pub released: IntCounter,
    pub exhausted: IntCounter,
    pub contended: IntCounter,
    pub cycle_latency: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let capacity = IntGauge::new("hotpool_pool_capacity", "Slots in the pool")?;
        let in_use = IntGauge::new("hotpool_pool_in_use", "Slots currently handed out")?;
        let arena_bytes = IntGauge::new("hotpool_arena_bytes", "Bytes reserved by the arena")?;
        let acquired = IntCounter::new("hotpool_pool_acquired_total", "Successful acquires")?;
        let released = IntCounter::new("hotpool_pool_released_total", "Releases")?;
        let exhausted =
            IntCounter::new("hotpool_pool_exhausted_total", "Acquires that found the pool empty")?;
        let contended =
            IntCounter::new("hotpool_pool_contended_total", "Free-list CAS retries")?;
        let cycle_latency = Histogram::with_opts(
            HistogramOpts::new(
                "hotpool_cycle_latency_ns",
                "Acquire/fill/release cycle time",
            )
            .buckets(vec![25.0, 50.0, 100.0, 250.0, 1_000.0, 10_000.0]),
        )?;

        registry.register(Box::new(capacity.clone()))?;
        registry.register(Box::new(in_use.clone()))?;
        registry.register(Box::new(arena_bytes.clone()))?;
        registry.register(Box::new(acquired.clone()))?;
        registry.register(Box::new(released.clone()))?;
        registry.register(Box::new(exhausted.clone()))?;
        registry.register(Box::new(contended.clone()))?;
        registry.register(Box::new(cycle_latency.clone()))?;

        Ok(Self {
            registry,
            capacity,
            in_use,
            arena_bytes,
            acquired,
            released,
            exhausted,
            contended,
            cycle_latency,
        })
    }

    pub fn set_arena_bytes(&self, bytes: usize) {
        self.arena_bytes.set(bytes as i64);
    }

    /// Brings counters up to the observed totals.
    pub fn observe_pool(&self, observation: PoolObservation) {
        self.capacity.set(observation.capacity as i64);
        self.in_use.set(observation.in_use as i64);
        catch_up(&self.acquired, observation.acquired);
        catch_up(&self.released, observation.released);
        catch_up(&self.exhausted, observation.exhausted);
        catch_up(&self.contended, observation.contended);
    }

    pub fn observe_cycle_ns(&self, ns: u64) {
        self.cycle_latency.observe(ns as f64);
    }

    pub fn gather_metrics(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn catch_up(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_updates_gauges_and_counters() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.observe_pool(PoolObservation {
            capacity: 10,
            in_use: 3,
            acquired: 7,
            released: 4,
            exhausted: 1,
            contended: 0,
        });
        assert_eq!(metrics.capacity.get(), 10);
        assert_eq!(metrics.in_use.get(), 3);
        assert_eq!(metrics.acquired.get(), 7);

        // Totals only move forward.
        metrics.observe_pool(PoolObservation {
            capacity: 10,
            in_use: 0,
            acquired: 7,
            released: 7,
            ..PoolObservation::default()
        });
        assert_eq!(metrics.released.get(), 7);
        assert_eq!(metrics.exhausted.get(), 1);
    }

    #[test]
    fn renders_text_exposition() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.set_arena_bytes(1 << 20);
        metrics.observe_cycle_ns(40);
        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("hotpool_arena_bytes 1048576"));
        assert!(text.contains("hotpool_cycle_latency_ns_count 1"));
    }
}
