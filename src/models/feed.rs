//! Feed entries, action events, and feed presentation types.

use crate::models::{TargetCard, TargetRef, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Content-mutation action that triggers fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// A meme was published.
    CreateMeme,
    /// A meme was liked.
    LikeMeme,
    /// A comment was posted.
    Comment,
    /// A user followed another user.
    Follow,
    /// Content was bookmarked.
    Bookmark,
    /// A collection was published.
    CreateCollection,
}

impl ActionType {
    /// Returns the action as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateMeme => "create_meme",
            Self::LikeMeme => "like_meme",
            Self::Comment => "comment",
            Self::Follow => "follow",
            Self::Bookmark => "bookmark",
            Self::CreateCollection => "create_collection",
        }
    }

    /// Parses an action from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "create_meme" => Some(Self::CreateMeme),
            "like_meme" => Some(Self::LikeMeme),
            "comment" => Some(Self::Comment),
            "follow" => Some(Self::Follow),
            "bookmark" => Some(Self::Bookmark),
            "create_collection" => Some(Self::CreateCollection),
            _ => None,
        }
    }

    /// Returns true for actions that publish new content.
    ///
    /// Create-type actions fan out to the actor's followers; reactive actions
    /// go to the target's owner only.
    #[must_use]
    pub const fn is_create(&self) -> bool {
        matches!(self, Self::CreateMeme | Self::CreateCollection)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A content-mutation event published by a collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEvent {
    /// Who performed the action.
    pub actor_id: UserId,
    /// What happened.
    pub action: ActionType,
    /// What it happened to.
    pub target: TargetRef,
    /// Collaborator-defined payload carried into each feed entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Explicit audience override; when present, inference is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_users: Option<Vec<UserId>>,
}

impl ActionEvent {
    /// Creates an event with inferred audience.
    #[must_use]
    pub const fn new(actor_id: UserId, action: ActionType, target: TargetRef) -> Self {
        Self {
            actor_id,
            action,
            target,
            data: None,
            affected_users: None,
        }
    }
}

/// One materialized activity-feed row, owned by `owner_id`.
///
/// At most 1000 live entries per owner; the oldest are pruned FIFO after any
/// insert batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Row id (UUIDv7, time-ordered).
    pub id: String,
    /// The recipient whose feed this row lives in.
    pub owner_id: UserId,
    /// Who performed the action.
    pub actor_id: UserId,
    /// The action performed.
    pub action: ActionType,
    /// The content acted on.
    pub target: TargetRef,
    /// Collaborator-defined payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// When the entry was written (Unix seconds).
    pub created_at: u64,
}

impl FeedEntry {
    /// Creates a feed entry for a recipient from an action event.
    #[must_use]
    pub fn from_event(event: &ActionEvent, owner_id: UserId, created_at: u64) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            owner_id,
            actor_id: event.actor_id.clone(),
            action: event.action,
            target: event.target.clone(),
            data: event.data.clone(),
            created_at,
        }
    }
}

/// Feed composition algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedAlgorithm {
    /// Strictly newest-first.
    Chronological,
    /// Trending-ranked order.
    Popular,
    /// Blended sources, shuffled before pagination.
    #[default]
    Mixed,
}

impl FeedAlgorithm {
    /// Returns the algorithm as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chronological => "chronological",
            Self::Popular => "popular",
            Self::Mixed => "mixed",
        }
    }

    /// Parses an algorithm from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "chronological" => Some(Self::Chronological),
            "popular" => Some(Self::Popular),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }
}

impl fmt::Display for FeedAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which source contributed an item to a composed feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    /// Authored by someone the viewer follows.
    Following,
    /// Matched the viewer's interest tags.
    Interest,
    /// Pulled from the trending snapshot.
    Trending,
}

/// One item of a composed feed with viewer-relative flags attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    /// Resolved presentation card.
    pub card: TargetCard,
    /// Which source contributed the item.
    pub source: FeedSource,
    /// Whether the viewer has liked this content. Always false for anonymous.
    pub is_liked: bool,
    /// Whether the viewer follows the content's owner. Always false for
    /// anonymous or ownerless targets.
    pub is_following: bool,
}

/// Pagination envelope metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number.
    pub page: usize,
    /// Requested page size.
    pub limit: usize,
    /// Total item count. For the anonymous path this is the full source
    /// inventory; for the personalized path it is the composed window size.
    pub total: u64,
    /// Total page count derived from `total` and `limit`.
    pub total_pages: u64,
}

impl Pagination {
    /// Builds an envelope, rounding `total_pages` up.
    #[must_use]
    pub const fn new(page: usize, limit: usize, total: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(limit as u64)
        };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

/// A composed feed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPage {
    /// Items on this page.
    pub items: Vec<FeedItem>,
    /// Pagination metadata.
    pub pagination: Pagination,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::TargetKind;

    #[test]
    fn test_action_roundtrip() {
        for s in [
            "create_meme",
            "like_meme",
            "comment",
            "follow",
            "bookmark",
            "create_collection",
        ] {
            let action = ActionType::parse(s).unwrap();
            assert_eq!(action.as_str(), s);
        }
        assert_eq!(ActionType::parse("remix"), None);
    }

    #[test]
    fn test_create_classification() {
        assert!(ActionType::CreateMeme.is_create());
        assert!(ActionType::CreateCollection.is_create());
        assert!(!ActionType::LikeMeme.is_create());
        assert!(!ActionType::Follow.is_create());
    }

    #[test]
    fn test_entry_from_event() {
        let event = ActionEvent::new(
            UserId::from("alice"),
            ActionType::CreateMeme,
            TargetRef::new(TargetKind::Meme, "m1"),
        );
        let entry = FeedEntry::from_event(&event, UserId::from("bob"), 500);
        assert_eq!(entry.owner_id, UserId::from("bob"));
        assert_eq!(entry.actor_id, UserId::from("alice"));
        assert_eq!(entry.created_at, 500);
        assert!(!entry.id.is_empty());
    }

    #[test]
    fn test_pagination_rounding() {
        let p = Pagination::new(1, 20, 41);
        assert_eq!(p.total_pages, 3);
        let p = Pagination::new(1, 20, 40);
        assert_eq!(p.total_pages, 2);
        let p = Pagination::new(1, 20, 0);
        assert_eq!(p.total_pages, 0);
    }
}
