//! Data models for memefeed.
//!
//! This module contains all the core data structures used throughout the
//! engine: content pointers, metric snapshots, score records, feed entries,
//! and notifications.

mod feed;
mod metrics;
mod notification;
mod score;
mod target;

pub use feed::{
    ActionEvent, ActionType, FeedAlgorithm, FeedEntry, FeedItem, FeedPage, FeedSource, Pagination,
};
pub use metrics::{CreatorStats, EngagementMetrics, MetricSnapshot, TagUsage};
pub use notification::{EmitOutcome, EmitRequest, Notification, NotificationKind};
pub use score::{ScoreRecord, TrendingPeriod, TrendingStats};
pub use target::{TargetCard, TargetKind, TargetRef, UserId};
