//! CLI command implementations.
//!
//! Operational surface for the engine:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `refresh` | Recompute a trending snapshot from an exported catalog dump |
//! | `gc` | Remove expired scores, stale generations, and expired notifications |
//! | `stats` | Show the live trending snapshot for a period |
//!
//! # Example Usage
//!
//! ```bash
//! # Rebuild the daily snapshot atomically from a metrics export
//! memefeed refresh --period day --force --candidates dump.json
//!
//! # Preview what GC would delete
//! memefeed gc --dry-run
//!
//! # Top memes of the week
//! memefeed stats --period week --kind meme
//! ```

#![allow(clippy::print_stdout)]

use crate::config::EngineConfig;
use crate::models::{TargetKind, TrendingPeriod};
use crate::services::TrendingService;
use crate::storage::memory::InMemoryCatalog;
use crate::storage::sqlite::SqliteStore;
use crate::storage::traits::ScoreStore;
use crate::{Error, Result, current_timestamp, gc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Memefeed - feed composition, trending ranking, and fan-out engine.
#[derive(Parser)]
#[command(name = "memefeed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "MEMEFEED_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Log output format: text or json.
    #[arg(long, global = true, default_value = "text")]
    pub log_format: String,

    /// Expose Prometheus metrics on this address (e.g. 127.0.0.1:9200).
    #[arg(long, global = true)]
    pub metrics_listen: Option<std::net::SocketAddr>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Recompute a trending snapshot from a catalog dump.
    Refresh {
        /// Trending period: hour, day, week, or month.
        #[arg(short, long, default_value = "day")]
        period: String,

        /// Rebuild the whole period atomically instead of upserting.
        #[arg(short, long)]
        force: bool,

        /// Path to a JSON catalog dump with candidate metrics.
        #[arg(long)]
        candidates: PathBuf,
    },

    /// Remove expired scores, stale generations, and expired notifications.
    Gc {
        /// Count eligible rows without deleting anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the live trending snapshot for a period.
    Stats {
        /// Trending period: hour, day, week, or month.
        #[arg(short, long, default_value = "day")]
        period: String,

        /// Restrict to one content kind: meme, tag, template, or user.
        #[arg(short, long)]
        kind: Option<String>,

        /// Rows to show.
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

fn parse_period(s: &str) -> Result<TrendingPeriod> {
    TrendingPeriod::parse(s)
        .ok_or_else(|| Error::validation("period", format!("unknown period '{s}'")))
}

fn parse_kind(s: &str) -> Result<TargetKind> {
    TargetKind::parse(s).ok_or_else(|| Error::validation("kind", format!("unknown kind '{s}'")))
}

/// Refresh command: scores a catalog dump and writes the snapshot.
///
/// # Errors
///
/// Returns an error if the period is unknown, the dump cannot be loaded, or
/// the store fails.
pub fn cmd_refresh(
    config: &EngineConfig,
    period: &str,
    force: bool,
    candidates: &Path,
) -> Result<()> {
    let period = parse_period(period)?;
    let store = Arc::new(SqliteStore::new(config.db_path.clone())?);
    let catalog = Arc::new(InMemoryCatalog::from_json_path(candidates)?);
    println!(
        "Loaded {} candidates from {}",
        catalog.len(),
        candidates.display()
    );

    let service = TrendingService::new(store, catalog, config.trending.clone());
    let cancel = AtomicBool::new(false);
    let stats = service.refresh(period, force, &cancel)?;
    println!(
        "Refreshed {period}: scored {}, wrote {}, purged {} expired rows",
        stats.scored, stats.written, stats.purged
    );
    Ok(())
}

/// Gc command: one collection pass over the engine database.
///
/// # Errors
///
/// Returns an error if the store fails.
pub fn cmd_gc(config: &EngineConfig, dry_run: bool) -> Result<()> {
    let store = SqliteStore::new(config.db_path.clone())?;
    let result = gc::run(&store, &store, dry_run)?;
    println!("{}", result.summary());
    Ok(())
}

/// Stats command: prints the live snapshot for a period.
///
/// # Errors
///
/// Returns an error if the period or kind is unknown, or the store fails.
pub fn cmd_stats(
    config: &EngineConfig,
    period: &str,
    kind: Option<&str>,
    limit: usize,
) -> Result<()> {
    let period = parse_period(period)?;
    let kind = kind.map(parse_kind).transpose()?;
    let store = SqliteStore::new(config.db_path.clone())?;
    let now = current_timestamp();

    let counts = store.count_by_kind(period, now)?;
    if counts.is_empty() {
        println!("No live snapshot for period '{period}'");
        return Ok(());
    }
    let mut summary: Vec<String> = counts
        .iter()
        .map(|(kind, count)| format!("{kind}: {count}"))
        .collect();
    summary.sort();
    println!("Live rows ({period}): {}", summary.join(", "));

    let rows = store.ranked(kind, period, limit, now)?;
    for row in rows {
        println!(
            "{:>4}  {:<8}  {:<24}  {:.2}",
            row.rank, row.kind, row.target_id, row.score
        );
    }
    Ok(())
}
