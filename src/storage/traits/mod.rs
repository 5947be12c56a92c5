//! Storage and collaborator traits.

mod catalog;
mod feed_store;
mod notification_store;
mod score_store;
mod social;

pub use catalog::{Candidate, ContentCatalog};
pub use feed_store::FeedStore;
pub use notification_store::NotificationStore;
pub use score_store::ScoreStore;
pub use social::SocialGraph;
