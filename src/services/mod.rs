//! Business logic services.
//!
//! Services orchestrate the storage traits and provide the engine's
//! high-level operations: scoring, trending refresh/query, feed composition,
//! activity fan-out, and notification collapse.

mod composer;
mod fanout;
mod notifications;
mod scoring;
mod trending;

pub use composer::{FeedComposer, FeedQuery};
pub use fanout::{ActivityFanout, FanoutQueue, FanoutReport, FanoutWorkers};
pub use notifications::NotificationService;
pub use scoring::ScoreEngine;
pub use trending::{RefreshStats, TrendingItem, TrendingPage, TrendingService};
