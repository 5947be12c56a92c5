//! Trending score store trait.

use crate::Result;
use crate::models::{ScoreRecord, TargetKind, TrendingPeriod};
use std::collections::HashMap;

/// Store for ranked trending snapshots.
///
/// Visible rows are unique on (kind, `target_id`, period). Implementations
/// keep a current-generation pointer per period so forced rebuilds can swap a
/// complete new rank set in atomically instead of deleting and re-inserting
/// in place.
pub trait ScoreStore: Send + Sync {
    /// Upserts records into the current generation for their period.
    ///
    /// Idempotent per (kind, `target_id`, period) key; safe for overlapping
    /// non-forced refresh runs. Keys absent from `records` are left in place:
    /// when the candidate set shrinks, superseded rows stay visible (with
    /// possibly duplicated ranks) until they expire, a forced rebuild swaps
    /// them out, or expiry GC removes them.
    fn upsert_scores(&self, records: &[ScoreRecord]) -> Result<()>;

    /// Replaces the visible snapshot for a period with `records` in one atomic
    /// step: the full new rank set is written under a fresh generation and the
    /// current-generation pointer is flipped with it. Readers never observe an
    /// empty or partially rebuilt window.
    fn swap_generation(&self, period: TrendingPeriod, records: &[ScoreRecord]) -> Result<()>;

    /// Returns visible rows ordered by rank ascending.
    ///
    /// Rows with `expires_at < now` and rows from non-current generations are
    /// excluded. `kind = None` returns all kinds.
    fn ranked(
        &self,
        kind: Option<TargetKind>,
        period: TrendingPeriod,
        limit: usize,
        now: u64,
    ) -> Result<Vec<ScoreRecord>>;

    /// Returns visible row counts per kind for a period.
    fn count_by_kind(&self, period: TrendingPeriod, now: u64) -> Result<HashMap<TargetKind, usize>>;

    /// Deletes rows with `expires_at < now`. Returns the number removed.
    fn purge_expired_scores(&self, now: u64) -> Result<usize>;

    /// Counts rows with `expires_at < now` without deleting them.
    fn count_expired_scores(&self, now: u64) -> Result<usize>;

    /// Deletes rows left behind by superseded generations. Returns the number
    /// removed.
    fn purge_stale_generations(&self) -> Result<usize>;

    /// Counts rows from superseded generations without deleting them.
    fn count_stale_generations(&self) -> Result<usize>;
}
