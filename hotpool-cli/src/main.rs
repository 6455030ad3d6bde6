//! ## hotpool-cli
//! **Operational entrypoint for the arena and slot pool**
//!
//! `hotpool run` reserves the arena, builds an `OrderMsg` pool and drives the
//! acquire/fill/release loop on the configured workers. `topology` and `check`
//! help size and place that run before committing memory.

use std::error::Error;
use std::process::ExitCode;

use clap::Parser;
use hotpool_telemetry::{init_logging, MetricsRecorder};

mod commands;
mod error;
mod payload;

use commands::{Cli, Commands};
use error::CliError;

fn main() -> ExitCode {
    match execute(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", render_error(&e));
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Topology => {
            init_logging("info");
            commands::topology()
        }
        Commands::Check => {
            let config = commands::load_config(cli.config.as_ref())?;
            init_logging(&config.telemetry.log_level);
            commands::check(&config);
            Ok(())
        }
        Commands::Run(args) => {
            let config = commands::load_config(cli.config.as_ref())?;
            init_logging(&config.telemetry.log_level);
            let metrics = MetricsRecorder::new()?;
            commands::run(&config, &args, &metrics)?;
            if config.telemetry.metrics {
                print!("{}", metrics.gather_metrics()?);
            }
            Ok(())
        }
    }
}

/// `error: <message>` followed by one `caused by:` line per source.
fn render_error(error: &dyn Error) -> String {
    let mut out = format!("error: {error}");
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str(&format!("\n  caused by: {cause}"));
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotpool_core::PoolError;

    #[test]
    fn errors_render_with_display_messages() {
        let err = CliError::from(PoolError::CapacityExceedsArena {
            required: 6400,
            available: 4096,
        });
        let rendered = render_error(&err);
        assert!(rendered.starts_with("error: Pool setup failed:"), "{rendered}");
        assert!(rendered.contains("6400"));
        assert!(!rendered.contains("CapacityExceedsArena"));
    }

    #[test]
    fn missing_config_file_fails_with_a_message() {
        let cli = Cli::try_parse_from(["hotpool", "--config", "no/such/hotpool.yaml", "check"]).unwrap();
        let err = execute(cli).unwrap_err();
        assert!(render_error(&err).contains("no/such/hotpool.yaml"));
    }
}
