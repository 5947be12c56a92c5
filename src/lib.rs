//! # Memefeed
//!
//! Feed composition, trending ranking, and fan-out notification engine for a
//! meme-sharing platform.
//!
//! The crate owns the write-amplified and ranking-heavy paths of the platform:
//!
//! - **Scoring** ([`services::ScoreEngine`]): pure, per-kind popularity scores
//!   with exponential time decay.
//! - **Trending snapshots** ([`services::TrendingService`]): periodic ranked
//!   snapshots per (kind, period) with dense ranks and generation-swapped
//!   rebuilds.
//! - **Feed composition** ([`services::FeedComposer`]): blends follow-graph,
//!   interest, and trending sources into a paginated feed.
//! - **Activity fan-out** ([`services::ActivityFanout`]): materializes one feed
//!   entry per recipient on content-mutation events, with bounded retention.
//! - **Notification collapse** ([`services::NotificationService`]): merges
//!   near-duplicate notifications inside a one-hour window.
//!
//! Authentication, entity CRUD, media storage, and authorization live in
//! external collaborators and are consumed through the narrow traits in
//! [`storage::traits`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use memefeed::storage::sqlite::SqliteStore;
//! use memefeed::services::{FeedComposer, FeedQuery};
//! use memefeed::models::FeedAlgorithm;
//! use std::sync::Arc;
//!
//! let store = Arc::new(SqliteStore::new("feed.db")?);
//! let composer = FeedComposer::new(store, catalog, graph, config);
//! let page = composer.compose(Some(&viewer), &FeedQuery {
//!     page: 1,
//!     limit: 20,
//!     algorithm: FeedAlgorithm::Mixed,
//! })?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
pub mod gc;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{ComposerConfig, EngineConfig, FanoutConfig, TrendingConfig};
pub use models::{
    ActionEvent, ActionType, EngagementMetrics, FeedAlgorithm, FeedEntry, FeedItem, FeedPage,
    Notification, NotificationKind, Pagination, ScoreRecord, TargetKind, TargetRef, TrendingPeriod,
    UserId,
};
pub use services::{
    ActivityFanout, FanoutQueue, FeedComposer, FeedQuery, NotificationService, ScoreEngine,
    TrendingService,
};
pub use storage::{ContentCatalog, FeedStore, NotificationStore, ScoreStore, SocialGraph};

/// Error type for memefeed operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Validation` | Bad pagination, unknown period/kind/algorithm, invalid metric snapshots |
/// | `NotFound` | An id-level lookup misses (never raised for read-path filtering) |
/// | `Store` | Database queries fail, storage unavailable, queue closed/full |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Client-facing with field detail. Raised when:
    /// - `page < 1` or `limit` outside `[1, 100]` in a feed query
    /// - An unknown period, kind, action, or algorithm string is parsed
    /// - An engagement snapshot carries a `created_at` in the future
    #[error("invalid {field}: {message}")]
    Validation {
        /// The offending field.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// An entity was not found by id.
    ///
    /// Only raised for direct id-level lookups. Targets that vanish between a
    /// snapshot refresh and a read are *filtered* from result sets, not errors
    /// (partial-result tolerance).
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The entity class (e.g. `"notification"`).
        entity: &'static str,
        /// The id that missed.
        id: String,
    },

    /// A storage operation failed.
    ///
    /// Retryable (see [`is_retryable_store_error`]). Single-row writes never
    /// leave partial mutation state behind this variant.
    #[error("store operation '{operation}' failed: {cause}")]
    Store {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds a [`Error::Validation`] for the given field.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Builds a [`Error::Store`] for the given operation.
    #[must_use]
    pub fn store(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Store {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Returns true if the error is worth retrying against the store.
///
/// Validation and not-found errors are deterministic and never retried;
/// storage failures are assumed transient (connection loss, lock contention).
#[must_use]
pub const fn is_retryable_store_error(error: &Error) -> bool {
    matches!(error, Error::Store { .. })
}

/// Result type alias for memefeed operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Centralized so every component shares one clock convention. Falls back to 0
/// if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
