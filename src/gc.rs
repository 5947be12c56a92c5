//! Garbage collection of expired and superseded rows.
//!
//! Read paths filter expired scores and notifications at query time; this
//! module is the only place that actually deletes them. Stale score
//! generations left behind by interrupted forced refreshes are cleaned here
//! as well.

use crate::storage::traits::{NotificationStore, ScoreStore};
use crate::{Result, current_timestamp};
use chrono::{TimeZone, Utc};
use std::time::Instant;
use tracing::instrument;

/// Safely converts Duration to milliseconds as u64, capping at `u64::MAX`.
#[inline]
fn duration_to_millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Result of a garbage collection run.
#[derive(Debug, Clone, Copy, Default)]
pub struct GcResult {
    /// Expired score rows removed (or counted, on a dry run).
    pub expired_scores: usize,
    /// Superseded-generation score rows removed.
    pub stale_generations: usize,
    /// Expired notification rows removed.
    pub expired_notifications: usize,
    /// Whether this was a dry run (no actual changes made).
    pub dry_run: bool,
    /// Duration of the GC run in milliseconds.
    pub duration_ms: u64,
}

impl GcResult {
    /// Total rows removed or counted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.expired_scores + self.stale_generations + self.expired_notifications
    }

    /// Returns a human-readable summary of the GC result.
    #[must_use]
    pub fn summary(&self) -> String {
        let action = if self.dry_run { "would remove" } else { "removed" };
        if self.total() == 0 {
            format!("Nothing to collect ({}ms)", self.duration_ms)
        } else {
            format!(
                "{action} {} rows: {} expired scores, {} stale generations, {} expired notifications ({}ms)",
                self.total(),
                self.expired_scores,
                self.stale_generations,
                self.expired_notifications,
                self.duration_ms
            )
        }
    }
}

/// Runs one garbage collection pass against both stores.
///
/// A dry run counts eligible rows without deleting anything.
///
/// # Errors
///
/// Returns an error if either store fails.
#[instrument(
    name = "memefeed.gc.run",
    skip(scores, notifications),
    fields(component = "gc", operation = "run", dry_run = dry_run)
)]
pub fn run<S: ScoreStore, N: NotificationStore>(
    scores: &S,
    notifications: &N,
    dry_run: bool,
) -> Result<GcResult> {
    let start = Instant::now();
    let now = current_timestamp();

    let mut result = GcResult {
        dry_run,
        ..GcResult::default()
    };
    if dry_run {
        result.expired_scores = scores.count_expired_scores(now)?;
        result.stale_generations = scores.count_stale_generations()?;
        result.expired_notifications = notifications.count_expired_notifications(now)?;
    } else {
        result.expired_scores = scores.purge_expired_scores(now)?;
        result.stale_generations = scores.purge_stale_generations()?;
        result.expired_notifications = notifications.purge_expired_notifications(now)?;
    }
    result.duration_ms = duration_to_millis(start.elapsed());

    if !dry_run {
        metrics::counter!("gc_rows_removed_total", "kind" => "score")
            .increment(result.expired_scores as u64);
        metrics::counter!("gc_rows_removed_total", "kind" => "generation")
            .increment(result.stale_generations as u64);
        metrics::counter!("gc_rows_removed_total", "kind" => "notification")
            .increment(result.expired_notifications as u64);
    }

    let cutoff = Utc
        .timestamp_opt(i64::try_from(now).unwrap_or(i64::MAX), 0)
        .single()
        .map_or_else(|| now.to_string(), |t| t.to_rfc3339());
    tracing::info!(
        cutoff = %cutoff,
        expired_scores = result.expired_scores,
        stale_generations = result.stale_generations,
        expired_notifications = result.expired_notifications,
        dry_run,
        duration_ms = result.duration_ms,
        "gc pass complete"
    );
    Ok(result)
}
