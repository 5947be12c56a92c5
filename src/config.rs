//! Configuration management.
//!
//! Runtime configuration is a plain struct with full defaults; a TOML file
//! and `MEMEFEED_*` environment variables override individual fields. Layer
//! order is defaults, then file, then environment.

use crate::models::TrendingPeriod;
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration for the feed engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the engine's `SQLite` database.
    pub db_path: PathBuf,
    /// Trending snapshot settings.
    pub trending: TrendingConfig,
    /// Feed composition settings.
    pub composer: ComposerConfig,
    /// Asynchronous fan-out settings.
    pub fanout: FanoutConfig,
    /// Maximum live feed entries per recipient.
    pub retention_cap: usize,
    /// Notification collapse window in seconds.
    pub collapse_window_secs: u64,
}

/// Trending snapshot settings.
#[derive(Debug, Clone)]
pub struct TrendingConfig {
    /// Ranks kept per (kind, period) partition.
    pub top_n: usize,
    /// Candidates fetched from the catalog per partition before scoring.
    pub candidate_limit: usize,
    /// Snapshot TTL override; defaults to the period window when unset.
    pub snapshot_ttl_secs: Option<u64>,
}

impl TrendingConfig {
    /// Effective snapshot TTL for a period.
    #[must_use]
    pub fn ttl_secs(&self, period: TrendingPeriod) -> u64 {
        self.snapshot_ttl_secs
            .unwrap_or_else(|| period.default_ttl_secs())
    }
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            top_n: 100,
            candidate_limit: 1_000,
            snapshot_ttl_secs: None,
        }
    }
}

/// Feed composition settings.
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Share of the composed window reserved for followed creators.
    pub following_share: f64,
    /// Share of the composed window reserved for interest matches.
    pub interest_share: f64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            following_share: 0.6,
            interest_share: 0.3,
        }
    }
}

/// Asynchronous fan-out settings.
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Bounded queue depth between action producers and workers.
    pub queue_capacity: usize,
    /// Worker task count.
    pub workers: usize,
    /// Retries per event on retryable store failures.
    pub max_retries: u32,
    /// Base backoff in milliseconds, doubled per attempt.
    pub retry_base_ms: u64,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1_024,
            workers: 4,
            max_retries: 3,
            retry_base_ms: 100,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("memefeed.db"),
            trending: TrendingConfig::default(),
            composer: ComposerConfig::default(),
            fanout: FanoutConfig::default(),
            retention_cap: 1_000,
            collapse_window_secs: 3_600,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Database path.
    pub db_path: Option<String>,
    /// Feed retention cap.
    pub retention_cap: Option<usize>,
    /// Notification collapse window in seconds.
    pub collapse_window_secs: Option<u64>,
    /// Trending section.
    pub trending: Option<ConfigFileTrending>,
    /// Composer section.
    pub composer: Option<ConfigFileComposer>,
    /// Fan-out section.
    pub fanout: Option<ConfigFileFanout>,
}

/// Trending section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileTrending {
    /// Ranks kept per partition.
    pub top_n: Option<usize>,
    /// Candidates fetched per partition.
    pub candidate_limit: Option<usize>,
    /// Snapshot TTL in seconds.
    pub snapshot_ttl_secs: Option<u64>,
}

/// Composer section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileComposer {
    /// Following share of the window.
    pub following_share: Option<f64>,
    /// Interest share of the window.
    pub interest_share: Option<f64>,
}

/// Fan-out section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileFanout {
    /// Queue capacity.
    pub queue_capacity: Option<usize>,
    /// Worker count.
    pub workers: Option<usize>,
    /// Max retries per event.
    pub max_retries: Option<u32>,
    /// Base backoff in milliseconds.
    pub retry_base_ms: Option<u64>,
}

impl EngineConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path, then applies environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::store("read_config_file", e))?;
        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| crate::Error::store("parse_config_file", e))?;

        let mut config = Self::from_config_file(file);
        config.apply_env();
        Ok(config)
    }

    /// Returns defaults with environment overrides applied.
    #[must_use]
    pub fn load_default() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Converts a `ConfigFile` to `EngineConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(db_path) = file.db_path {
            config.db_path = PathBuf::from(db_path);
        }
        if let Some(cap) = file.retention_cap {
            config.retention_cap = cap;
        }
        if let Some(window) = file.collapse_window_secs {
            config.collapse_window_secs = window;
        }
        if let Some(trending) = file.trending {
            if let Some(v) = trending.top_n {
                config.trending.top_n = v;
            }
            if let Some(v) = trending.candidate_limit {
                config.trending.candidate_limit = v;
            }
            if trending.snapshot_ttl_secs.is_some() {
                config.trending.snapshot_ttl_secs = trending.snapshot_ttl_secs;
            }
        }
        if let Some(composer) = file.composer {
            if let Some(v) = composer.following_share {
                config.composer.following_share = v;
            }
            if let Some(v) = composer.interest_share {
                config.composer.interest_share = v;
            }
        }
        if let Some(fanout) = file.fanout {
            if let Some(v) = fanout.queue_capacity {
                config.fanout.queue_capacity = v;
            }
            if let Some(v) = fanout.workers {
                config.fanout.workers = v;
            }
            if let Some(v) = fanout.max_retries {
                config.fanout.max_retries = v;
            }
            if let Some(v) = fanout.retry_base_ms {
                config.fanout.retry_base_ms = v;
            }
        }

        config
    }

    /// Applies `MEMEFEED_*` environment overrides on top of the current
    /// values. Unparseable values are ignored.
    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("MEMEFEED_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        if let Some(cap) = env_parsed("MEMEFEED_RETENTION_CAP") {
            self.retention_cap = cap;
        }
        if let Some(window) = env_parsed("MEMEFEED_COLLAPSE_WINDOW_SECS") {
            self.collapse_window_secs = window;
        }
        if let Some(top_n) = env_parsed("MEMEFEED_TRENDING_TOP_N") {
            self.trending.top_n = top_n;
        }
        if let Some(workers) = env_parsed("MEMEFEED_FANOUT_WORKERS") {
            self.fanout.workers = workers;
        }
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Sets the retention cap.
    #[must_use]
    pub const fn with_retention_cap(mut self, cap: usize) -> Self {
        self.retention_cap = cap;
        self
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
