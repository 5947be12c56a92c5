//! Trending snapshot refresh and query.
//!
//! `refresh` is a scheduled or on-demand batch job. Non-forced runs are
//! idempotent per-key upserts and safe to overlap; forced runs rebuild the
//! period through the store's generation swap so readers never observe an
//! empty or partially rebuilt window. Rank sets are computed fully off-store
//! before anything is written, and the cancellation flag is only observed at
//! partition boundaries.

use crate::config::TrendingConfig;
use crate::models::{
    MetricSnapshot, ScoreRecord, TargetCard, TargetKind, TargetRef, TrendingPeriod, TrendingStats,
};
use crate::services::ScoreEngine;
use crate::storage::traits::{Candidate, ContentCatalog, ScoreStore};
use crate::{Error, Result, current_timestamp};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Instant;
use tracing::instrument;

/// Outcome of a refresh run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshStats {
    /// Candidates scored across all kinds.
    pub scored: usize,
    /// Records written.
    pub written: usize,
    /// Expired rows purged after the refresh.
    pub purged: usize,
    /// True if the run stopped at a partition boundary before writing
    /// everything (forced runs write nothing when cancelled).
    pub cancelled: bool,
}

/// One resolved trending item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingItem {
    /// Resolved presentation card.
    pub card: TargetCard,
    /// Popularity score at snapshot time.
    pub score: f64,
    /// Dense rank within the item's (kind, period) partition.
    pub rank: u32,
}

/// Trending query response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingPage {
    /// Ranked, resolved items.
    pub items: Vec<TrendingItem>,
    /// Summary statistics over the returned items.
    pub stats: TrendingStats,
    /// The period queried.
    pub period: TrendingPeriod,
}

/// Builds and serves ranked trending snapshots.
pub struct TrendingService<S: ScoreStore, C: ContentCatalog> {
    scores: Arc<S>,
    catalog: Arc<C>,
    config: TrendingConfig,
}

impl<S: ScoreStore, C: ContentCatalog> TrendingService<S, C> {
    /// Creates a new trending service.
    #[must_use]
    pub const fn new(scores: Arc<S>, catalog: Arc<C>, config: TrendingConfig) -> Self {
        Self {
            scores,
            catalog,
            config,
        }
    }

    /// Recomputes the top-N snapshot for a period.
    ///
    /// `force = false` upserts per key and is safe to run concurrently with
    /// itself; keys that dropped out of the candidate set remain visible until
    /// they expire or a forced rebuild replaces the window, so ranks can
    /// briefly duplicate across old and new rows. `force = true` replaces the
    /// whole period via generation swap; callers serialize forced runs per
    /// period.
    ///
    /// The `cancel` flag is checked between kind partitions only. A cancelled
    /// non-forced run keeps the partitions already upserted; a cancelled
    /// forced run writes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog or store fails.
    #[instrument(
        name = "memefeed.trending.refresh",
        skip(self, cancel),
        fields(component = "trending", operation = "refresh", period = %period, force = force)
    )]
    #[allow(clippy::cast_possible_truncation)]
    pub fn refresh(
        &self,
        period: TrendingPeriod,
        force: bool,
        cancel: &AtomicBool,
    ) -> Result<RefreshStats> {
        let start = Instant::now();
        let now = current_timestamp();
        let mut stats = RefreshStats::default();

        let mut staged: Vec<ScoreRecord> = Vec::new();
        for kind in TargetKind::all() {
            if cancel.load(AtomicOrdering::Relaxed) {
                stats.cancelled = true;
                break;
            }

            let records = self.rank_partition(*kind, period, now, &mut stats.scored)?;
            if force {
                staged.extend(records);
            } else {
                stats.written += records.len();
                self.scores.upsert_scores(&records)?;
            }
        }

        if force {
            if stats.cancelled {
                tracing::warn!(period = %period, "forced refresh cancelled before swap, nothing written");
            } else {
                stats.written = staged.len();
                self.scores.swap_generation(period, &staged)?;
            }
        }

        if !stats.cancelled {
            stats.purged = self.scores.purge_expired_scores(now)?;
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        metrics::counter!(
            "trending_refresh_total",
            "period" => period.as_str(),
            "force" => if force { "true" } else { "false" }
        )
        .increment(1);
        metrics::histogram!("trending_refresh_duration_ms").record(duration_ms as f64);
        tracing::info!(
            scored = stats.scored,
            written = stats.written,
            purged = stats.purged,
            cancelled = stats.cancelled,
            duration_ms,
            "trending refresh finished"
        );

        Ok(stats)
    }

    /// Scores and ranks one (kind, period) partition, fully off-store.
    #[allow(clippy::cast_possible_truncation)]
    fn rank_partition(
        &self,
        kind: TargetKind,
        period: TrendingPeriod,
        now: u64,
        scored: &mut usize,
    ) -> Result<Vec<ScoreRecord>> {
        let since = now.saturating_sub(period.window_secs());
        let candidates = self
            .catalog
            .candidates(kind, since, self.config.candidate_limit)?;

        let mut scored_candidates: Vec<(Candidate, f64)> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match ScoreEngine::score(&candidate.metrics, now) {
                Ok(score) => scored_candidates.push((candidate, score)),
                Err(e) => {
                    // Collaborator clock skew; drop the candidate rather than
                    // failing the whole partition.
                    tracing::warn!(target = %candidate.target, error = %e, "skipping unscorable candidate");
                },
            }
        }
        *scored += scored_candidates.len();

        scored_candidates.sort_by(|(a, score_a), (b, score_b)| {
            score_b
                .total_cmp(score_a)
                .then_with(|| tie_break(&b.metrics, &a.metrics))
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.target.id.cmp(&b.target.id))
        });
        scored_candidates.truncate(self.config.top_n);

        let expires_at = now + self.config.ttl_secs(period);
        let records = scored_candidates
            .into_iter()
            .enumerate()
            .map(|(i, (candidate, score))| ScoreRecord {
                kind,
                target_id: candidate.target.id,
                period,
                score,
                rank: (i + 1) as u32,
                data: serde_json::to_value(candidate.metrics).ok(),
                computed_at: now,
                expires_at,
            })
            .collect();
        Ok(records)
    }

    /// Returns the current snapshot, rank ascending, joined against live
    /// catalog cards.
    ///
    /// Targets deleted or privatized since the snapshot was computed are
    /// dropped silently; the snapshot has a documented staleness window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a limit outside `[1, 100]`.
    #[instrument(
        name = "memefeed.trending.query",
        skip(self),
        fields(component = "trending", operation = "query", period = %period)
    )]
    pub fn query(
        &self,
        kind: Option<TargetKind>,
        period: TrendingPeriod,
        limit: usize,
    ) -> Result<TrendingPage> {
        if limit == 0 || limit > 100 {
            return Err(Error::validation("limit", "must be between 1 and 100"));
        }

        let now = current_timestamp();
        let records = self.scores.ranked(kind, period, limit, now)?;

        let refs: Vec<TargetRef> = records.iter().map(ScoreRecord::target).collect();
        let cards = self.catalog.resolve(&refs)?;

        let mut items = Vec::with_capacity(cards.len());
        let mut stats = TrendingStats::default();
        for card in cards {
            if let Some(record) = records
                .iter()
                .find(|r| r.kind == card.target.kind && r.target_id == card.target.id)
            {
                *stats.by_kind.entry(record.kind).or_insert(0) += 1;
                items.push(TrendingItem {
                    card,
                    score: record.score,
                    rank: record.rank,
                });
            }
        }
        stats.total_items = items.len();

        Ok(TrendingPage {
            items,
            stats,
            period,
        })
    }
}

/// Per-kind tie-break between equal scores, best-first when used with
/// `b cmp a` ordering at the call site.
fn tie_break(a: &MetricSnapshot, b: &MetricSnapshot) -> Ordering {
    match (a, b) {
        (MetricSnapshot::Meme(a), MetricSnapshot::Meme(b)) => a
            .likes
            .cmp(&b.likes)
            .then_with(|| a.views.cmp(&b.views))
            .then_with(|| a.shares.cmp(&b.shares))
            .then_with(|| a.created_at.cmp(&b.created_at)),
        (MetricSnapshot::User(a), MetricSnapshot::User(b)) => a
            .followers
            .cmp(&b.followers)
            .then_with(|| a.content_count.cmp(&b.content_count)),
        // Tag/template usage counts equal the score itself
        _ => Ordering::Equal,
    }
}
