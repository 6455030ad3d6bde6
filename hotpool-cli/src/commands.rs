use std::hint::black_box;
use std::mem::size_of;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use hotpool_config::{HotpoolConfig, LocalityMode, LockMode};
use hotpool_core::affinity;
use hotpool_core::alloc::{ArenaOptions, LocalityPolicy, LockPolicy};
use hotpool_core::{FixedSlotPool, MemoryArena};
use hotpool_telemetry::logging::log_degraded;
use hotpool_telemetry::{MetricsRecorder, PoolObservation};

use crate::error::CliError;
use crate::payload::{OrderMsg, Side};

/// Cycle latency is sampled once per this many iterations.
const LATENCY_SAMPLE_EVERY: u64 = 1024;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Configuration file; defaults to config/hotpool.yaml plus HOTPOOL_* overrides
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the arena and pool, then run the acquire/fill/release loop
    Run(RunArgs),
    /// Print CPU to locality-domain mapping
    Topology,
    /// Validate configuration without reserving memory
    Check,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Override the number of worker threads
    #[arg(short, long)]
    pub threads: Option<usize>,
    /// Override iterations per worker
    #[arg(short, long)]
    pub iterations: Option<u64>,
}

pub fn load_config(path: Option<&PathBuf>) -> Result<HotpoolConfig, CliError> {
    let config = match path {
        Some(path) => HotpoolConfig::load_from_path(path)?,
        None => HotpoolConfig::load()?,
    };
    config.check_footprint(size_of::<OrderMsg>())?;
    Ok(config)
}

pub fn arena_options(config: &HotpoolConfig) -> ArenaOptions {
    let locality = match config.arena.locality {
        LocalityMode::Required => LocalityPolicy::Required,
        LocalityMode::Preferred => LocalityPolicy::Preferred,
    };
    let lock = match config.arena.lock {
        LockMode::All => LockPolicy::All,
        LockMode::Region => LockPolicy::Region,
        LockMode::None => LockPolicy::None,
    };
    ArenaOptions::new(config.arena.size_bytes, config.arena.domain)
        .huge_pages(config.arena.huge_pages)
        .locality(locality)
        .lock(lock)
}

/// Totals reported by one worker.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub cycles: u64,
    pub dropped: u64,
}

pub fn run(config: &HotpoolConfig, args: &RunArgs, metrics: &MetricsRecorder) -> Result<Vec<WorkerReport>, CliError> {
    let threads = args.threads.unwrap_or(config.workers.threads).max(1);
    let iterations = args.iterations.unwrap_or(config.workers.iterations);

    let arena = MemoryArena::with_options(arena_options(config))?;
    metrics.set_arena_bytes(arena.size());

    let pool = match config.pool.slot_size {
        Some(slot_size) => FixedSlotPool::<OrderMsg>::with_slot_size(&arena, config.pool.capacity, slot_size)?,
        None => FixedSlotPool::<OrderMsg>::new(&arena, config.pool.capacity)?,
    };

    info!(threads, iterations, "Starting workers");
    let started = Instant::now();

    let reports = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|index| {
                let pool = &pool;
                let arena = &arena;
                let cpu = config.workers.cpu_for(index);
                thread::Builder::new()
                    .name(format!("hotpool-worker-{index}"))
                    .spawn_scoped(s, move || {
                        if let Some(cpu) = cpu {
                            place_worker(cpu, arena.domain());
                        }
                        work(pool, index as u64, iterations, metrics)
                    })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle?
                    .join()
                    .map_err(|_| CliError::WorkerPanicked)
            })
            .collect::<Result<Vec<_>, _>>()
    })?;

    let elapsed = started.elapsed();
    let stats = pool.snapshot();
    metrics.observe_pool(PoolObservation {
        capacity: pool.capacity() as u64,
        in_use: stats.in_use,
        acquired: stats.acquired,
        released: stats.released,
        exhausted: stats.exhausted,
        contended: stats.contended,
    });

    let cycles: u64 = reports.iter().map(|r| r.cycles).sum();
    info!(
        cycles,
        elapsed_ms = elapsed.as_millis() as u64,
        ns_per_cycle = elapsed.as_nanos() as u64 / cycles.max(1),
        exhausted = stats.exhausted,
        contended = stats.contended,
        "Run complete"
    );
    Ok(reports)
}

fn place_worker(cpu: usize, arena_domain: u32) {
    if let Err(e) = affinity::pin_current_thread(cpu) {
        log_degraded("Thread pinning", &e);
        return;
    }
    match affinity::cpu_to_domain(cpu) {
        Ok(domain) if domain != arena_domain => {
            warn!(cpu, domain, arena_domain, "Worker pinned outside the arena's locality domain")
        }
        Ok(_) => {}
        Err(e) => log_degraded("Locality lookup", &e),
    }
}

/// Steady-state loop: acquire, fill, hand off, release.
fn work(pool: &FixedSlotPool<'_, OrderMsg>, worker: u64, iterations: u64, metrics: &MetricsRecorder) -> WorkerReport {
    let mut report = WorkerReport::default();
    for seq in 0..iterations {
        let sampled = seq % LATENCY_SAMPLE_EVERY == 0;
        let start = sampled.then(Instant::now);

        let Some(slot) = pool.acquire() else {
            report.dropped += 1;
            continue;
        };
        let side = if seq % 2 == 0 { Side::Buy } else { Side::Sell };
        let order = OrderMsg::new(seq, (worker << 48) | seq, 7, 101.25, 10, side);
        // SAFETY: freshly acquired slot, exclusively held until release below.
        unsafe {
            slot.as_ptr().write(order);
            black_box(slot.as_ptr().read().notional());
            pool.release(slot);
        }
        report.cycles += 1;

        if let Some(start) = start {
            metrics.observe_cycle_ns(start.elapsed().as_nanos() as u64);
        }
    }
    report
}

pub fn topology() -> Result<(), CliError> {
    let domains = affinity::online_domains()?;
    println!("cpus: {}", affinity::available_cpus());
    println!("domains: {:?}", domains);
    for cpu in 0..affinity::available_cpus() {
        match affinity::cpu_to_domain(cpu) {
            Ok(domain) => println!("cpu {cpu:>4} -> domain {domain}"),
            Err(e) => println!("cpu {cpu:>4} -> unknown ({e})"),
        }
    }
    if let Some(cpu) = affinity::current_cpu() {
        println!("current cpu: {cpu}");
    }
    Ok(())
}

pub fn check(config: &HotpoolConfig) {
    let slot = config.pool.effective_slot_size(size_of::<OrderMsg>());
    println!(
        "arena: {} bytes on domain {} ({:?} locality, {:?} lock, huge pages: {})",
        config.arena.size_bytes,
        config.arena.domain,
        config.arena.locality,
        config.arena.lock,
        config.arena.huge_pages
    );
    println!(
        "pool: {} slots x {} bytes = {} bytes",
        config.pool.capacity,
        slot,
        config.pool.capacity * slot
    );
    println!(
        "workers: {} threads, {} iterations, cpus {:?}",
        config.workers.threads, config.workers.iterations, config.workers.cpus
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> HotpoolConfig {
        let mut config = HotpoolConfig::default();
        config.arena.size_bytes = 1 << 20;
        config.arena.locality = LocalityMode::Preferred;
        config.arena.lock = LockMode::None;
        config.pool.capacity = 64;
        config.workers.iterations = 10_000;
        config
    }

    #[test]
    fn maps_config_modes_to_arena_policies() {
        let options = arena_options(&small_config());
        assert_eq!(options.size_bytes, 1 << 20);
        assert_eq!(options.locality, LocalityPolicy::Preferred);
        assert_eq!(options.lock, LockPolicy::None);
        assert!(options.huge_pages);
    }

    #[test]
    fn single_worker_never_drops() {
        let metrics = MetricsRecorder::new().unwrap();
        let reports = run(&small_config(), &RunArgs::default(), &metrics).unwrap();
        assert_eq!(reports, vec![WorkerReport { cycles: 10_000, dropped: 0 }]);
        assert_eq!(metrics.acquired.get(), 10_000);
        assert_eq!(metrics.in_use.get(), 0);
    }

    #[test]
    fn multiple_workers_share_one_pool() {
        let metrics = MetricsRecorder::new().unwrap();
        let args = RunArgs {
            threads: Some(4),
            iterations: Some(5_000),
        };
        let reports = run(&small_config(), &args, &metrics).unwrap();
        assert_eq!(reports.len(), 4);
        // 4 workers each hold at most one slot of 64, so nobody is ever starved.
        assert!(reports.iter().all(|r| r.cycles == 5_000 && r.dropped == 0));
        assert_eq!(metrics.released.get(), 20_000);
    }

    #[test]
    fn oversized_pool_fails_before_running() {
        let mut config = small_config();
        config.pool.capacity = (1 << 20) / 64 + 1;
        let metrics = MetricsRecorder::new().unwrap();
        assert!(matches!(
            run(&config, &RunArgs::default(), &metrics),
            Err(CliError::Pool(_))
        ));
    }

    #[test]
    fn footprint_check_agrees_with_arena_rounding() {
        let page = hotpool_core::alloc::page_size();
        let mut config = small_config();
        config.arena.size_bytes = page + 904;
        config.pool.capacity = (page + 904) / size_of::<OrderMsg>() + 1;
        config.workers.iterations = 100;
        config.check_footprint(size_of::<OrderMsg>()).unwrap();

        let metrics = MetricsRecorder::new().unwrap();
        let reports = run(&config, &RunArgs::default(), &metrics).unwrap();
        assert_eq!(reports[0].cycles, 100);
    }

    #[test]
    fn cli_parses_run_overrides() {
        let cli = Cli::try_parse_from(["hotpool", "run", "--threads", "2", "-i", "50"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.threads, Some(2));
                assert_eq!(args.iterations, Some(50));
            }
            _ => panic!("expected run"),
        }
        assert!(cli.config.is_none());
    }
}
