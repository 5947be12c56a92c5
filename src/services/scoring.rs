//! Pure popularity scoring per content kind.
//!
//! The engine is side-effect free and deterministic given a fixed clock:
//! `now` is always a parameter, never read from the system. Storage never
//! enters this module.

use crate::Result;
use crate::models::{CreatorStats, EngagementMetrics, MetricSnapshot, TagUsage};

// Meme engagement weights
/// Weight of a like.
const LIKE_WEIGHT: f64 = 5.0;
/// Weight of a share.
const SHARE_WEIGHT: f64 = 8.0;
/// Weight of a download.
const DOWNLOAD_WEIGHT: f64 = 3.0;
/// Weight of a comment.
const COMMENT_WEIGHT: f64 = 4.0;
/// Weight of a view.
const VIEW_WEIGHT: f64 = 0.1;
/// View contribution is capped so view-farming cannot dominate the score.
const VIEW_CAP: f64 = 100.0;
/// Decay e-folding time in hours; a day-old meme scores at `1/e` of fresh.
const DECAY_HOURS: f64 = 24.0;

// Creator score weights
/// Weight of a follower.
const FOLLOWER_WEIGHT: f64 = 2.0;
/// Weight of a like received across content.
const LIKES_RECEIVED_WEIGHT: f64 = 0.1;

/// Seconds per hour for decay math.
const SECONDS_PER_HOUR: f64 = 3_600.0;

/// Pure scoring functions, one variant per content kind.
///
/// Dispatch happens on the [`MetricSnapshot`] tag so callers never branch on
/// kind themselves.
pub struct ScoreEngine;

impl ScoreEngine {
    /// Scores a metric snapshot at the given clock.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] for snapshots with a creation time
    /// in the future.
    #[allow(clippy::cast_precision_loss)]
    pub fn score(snapshot: &MetricSnapshot, now: u64) -> Result<f64> {
        match snapshot {
            MetricSnapshot::Meme(metrics) => Self::meme_score(metrics, now),
            MetricSnapshot::Tag(usage) | MetricSnapshot::Template(usage) => {
                Ok(Self::usage_score(usage))
            },
            MetricSnapshot::User(stats) => Ok(Self::creator_score(stats)),
        }
    }

    /// Engagement-weighted meme score with exponential time decay.
    #[allow(clippy::cast_precision_loss, clippy::suboptimal_flops)]
    fn meme_score(metrics: &EngagementMetrics, now: u64) -> Result<f64> {
        metrics.validate(now)?;

        let engagement = metrics.likes as f64 * LIKE_WEIGHT
            + metrics.shares as f64 * SHARE_WEIGHT
            + metrics.downloads as f64 * DOWNLOAD_WEIGHT
            + metrics.comments as f64 * COMMENT_WEIGHT
            + (metrics.views as f64 * VIEW_WEIGHT).min(VIEW_CAP);

        let age_hours = (now.saturating_sub(metrics.created_at)) as f64 / SECONDS_PER_HOUR;
        let decay = (-age_hours / DECAY_HOURS).exp();

        Ok(engagement * decay)
    }

    /// Tag/template score: the raw usage count, monotonic and undecayed.
    #[allow(clippy::cast_precision_loss)]
    fn usage_score(usage: &TagUsage) -> f64 {
        usage.usage_count as f64
    }

    /// Creator score: follower-weighted with content and received likes.
    #[allow(clippy::cast_precision_loss, clippy::suboptimal_flops)]
    fn creator_score(stats: &CreatorStats) -> f64 {
        stats.followers as f64 * FOLLOWER_WEIGHT
            + stats.content_count as f64
            + stats.likes_received as f64 * LIKES_RECEIVED_WEIGHT
    }
}
