//! Trending score records and periods.

use crate::models::{TargetKind, TargetRef};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Time window a trending snapshot covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendingPeriod {
    /// Last hour.
    Hour,
    /// Last 24 hours.
    #[default]
    Day,
    /// Last 7 days.
    Week,
    /// Last 30 days.
    Month,
}

impl TrendingPeriod {
    /// Returns all period variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Hour, Self::Day, Self::Week, Self::Month]
    }

    /// Returns the period as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Parses a period from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            _ => None,
        }
    }

    /// Returns the length of the candidate window in seconds.
    #[must_use]
    pub const fn window_secs(&self) -> u64 {
        match self {
            Self::Hour => 3_600,
            Self::Day => 86_400,
            Self::Week => 7 * 86_400,
            Self::Month => 30 * 86_400,
        }
    }

    /// Default time-to-live for snapshot rows of this period.
    ///
    /// A snapshot is useful for as long as the window it summarized; stale
    /// rows turn logically invisible and are swept by GC.
    #[must_use]
    pub const fn default_ttl_secs(&self) -> u64 {
        self.window_secs()
    }
}

impl fmt::Display for TrendingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One ranked row of a trending snapshot.
///
/// Unique on (kind, `target_id`, period) among visible rows. Ranks inside a
/// (kind, period) partition are dense `1..N` with no gaps or duplicates. Rows
/// with `expires_at < now` are logically invisible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Content kind.
    pub kind: TargetKind,
    /// Collaborator-side target id.
    pub target_id: String,
    /// Period this row was computed for.
    pub period: TrendingPeriod,
    /// Computed popularity score.
    pub score: f64,
    /// Dense rank within the (kind, period) partition, starting at 1.
    pub rank: u32,
    /// Metric snapshot the score was computed from, kept for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// When the score was computed (Unix seconds).
    pub computed_at: u64,
    /// When the row turns invisible (Unix seconds).
    pub expires_at: u64,
}

impl ScoreRecord {
    /// Returns the target reference this record points at.
    #[must_use]
    pub fn target(&self) -> TargetRef {
        TargetRef::new(self.kind, self.target_id.clone())
    }

    /// Returns true if the row is visible at the given clock.
    #[must_use]
    pub const fn is_live(&self, now: u64) -> bool {
        self.expires_at >= now
    }
}

/// Summary statistics attached to a trending query response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendingStats {
    /// Total items returned.
    pub total_items: usize,
    /// Item count per kind.
    pub by_kind: HashMap<TargetKind, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_roundtrip() {
        for period in TrendingPeriod::all() {
            assert_eq!(TrendingPeriod::parse(period.as_str()), Some(*period));
        }
        assert_eq!(TrendingPeriod::parse("fortnight"), None);
    }

    #[test]
    fn test_window_ordering() {
        assert!(TrendingPeriod::Hour.window_secs() < TrendingPeriod::Day.window_secs());
        assert!(TrendingPeriod::Day.window_secs() < TrendingPeriod::Week.window_secs());
        assert!(TrendingPeriod::Week.window_secs() < TrendingPeriod::Month.window_secs());
    }

    #[test]
    fn test_record_liveness() {
        let record = ScoreRecord {
            kind: TargetKind::Meme,
            target_id: "m1".to_string(),
            period: TrendingPeriod::Day,
            score: 1.0,
            rank: 1,
            data: None,
            computed_at: 100,
            expires_at: 200,
        };
        assert!(record.is_live(200));
        assert!(!record.is_live(201));
        assert_eq!(record.target(), TargetRef::meme("m1"));
    }
}
