//! Read-only metric snapshots fed into the score engine.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Engagement counters for a meme at a point in time.
///
/// A read-only snapshot handed over by the content collaborator; the engine
/// never mutates these counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    /// Like count.
    pub likes: u64,
    /// View count.
    pub views: u64,
    /// Share count.
    pub shares: u64,
    /// Download count.
    pub downloads: u64,
    /// Comment count.
    pub comments: u64,
    /// Creation time of the content (Unix seconds).
    pub created_at: u64,
}

impl EngagementMetrics {
    /// Validates the snapshot against the given clock.
    ///
    /// Counter fields are unsigned so negative inputs are unrepresentable; the
    /// remaining invalid shape is a creation time in the future, which would
    /// produce a decay factor above 1.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `created_at` is after `now`.
    pub fn validate(&self, now: u64) -> Result<()> {
        if self.created_at > now {
            return Err(Error::validation(
                "created_at",
                format!("creation time {} is in the future (now {now})", self.created_at),
            ));
        }
        Ok(())
    }
}

/// Usage counter for a tag or template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagUsage {
    /// How many live posts use the tag/template inside the period window.
    pub usage_count: u64,
}

/// Aggregate stats for a creator account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorStats {
    /// Follower count.
    pub followers: u64,
    /// Published content count.
    pub content_count: u64,
    /// Total likes received across content.
    pub likes_received: u64,
}

/// Per-kind metric snapshot, the tagged input to the score engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum MetricSnapshot {
    /// Meme engagement counters.
    Meme(EngagementMetrics),
    /// Tag usage counter.
    Tag(TagUsage),
    /// Template usage counter.
    Template(TagUsage),
    /// Creator account stats.
    User(CreatorStats),
}

impl MetricSnapshot {
    /// Returns the content kind this snapshot belongs to.
    #[must_use]
    pub const fn kind(&self) -> crate::models::TargetKind {
        match self {
            Self::Meme(_) => crate::models::TargetKind::Meme,
            Self::Tag(_) => crate::models::TargetKind::Tag,
            Self::Template(_) => crate::models::TargetKind::Template,
            Self::User(_) => crate::models::TargetKind::User,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_future_creation() {
        let metrics = EngagementMetrics {
            created_at: 2_000,
            ..Default::default()
        };
        assert!(metrics.validate(1_000).is_err());
        assert!(metrics.validate(2_000).is_ok());
    }

    #[test]
    fn test_snapshot_kind() {
        let snap = MetricSnapshot::Tag(TagUsage { usage_count: 3 });
        assert_eq!(snap.kind(), crate::models::TargetKind::Tag);
    }
}
