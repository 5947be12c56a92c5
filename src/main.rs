//! Binary entry point for memefeed.
//!
//! This binary provides the operational CLI for the feed engine: trending
//! snapshot refreshes, garbage collection, and snapshot inspection.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::Parser;
use memefeed::cli::{Cli, Commands, cmd_gc, cmd_refresh, cmd_stats};
use memefeed::config::EngineConfig;
use memefeed::observability::{self, LogFormat};
use std::process::ExitCode;

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    observability::init_logging(LogFormat::parse(&cli.log_format), cli.verbose);

    if let Some(listen) = cli.metrics_listen {
        if let Err(e) = observability::init_metrics(listen) {
            eprintln!("Failed to install metrics recorder: {e}");
            return ExitCode::FAILURE;
        }
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, config: &EngineConfig) -> memefeed::Result<()> {
    match cli.command {
        Commands::Refresh {
            period,
            force,
            candidates,
        } => cmd_refresh(config, &period, force, &candidates),

        Commands::Gc { dry_run } => cmd_gc(config, dry_run),

        Commands::Stats {
            period,
            kind,
            limit,
        } => cmd_stats(config, &period, kind.as_deref(), limit),
    }
}

/// Loads configuration from the explicit path or defaults plus environment.
fn load_config(path: Option<&std::path::Path>) -> memefeed::Result<EngineConfig> {
    path.map_or_else(
        || Ok(EngineConfig::load_default()),
        EngineConfig::load_from_file,
    )
}
