//! Notification types.

use crate::models::{TargetRef, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Category of a notification, driving collapse identity and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Someone liked the owner's content.
    Like,
    /// Someone commented on the owner's content.
    Comment,
    /// Someone followed the owner.
    Follow,
    /// The owner was mentioned.
    Mention,
    /// Platform announcement.
    System,
}

impl NotificationKind {
    /// Returns all kind variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Like,
            Self::Comment,
            Self::Follow,
            Self::Mention,
            Self::System,
        ]
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Follow => "follow",
            Self::Mention => "mention",
            Self::System => "system",
        }
    }

    /// Parses a kind from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "like" => Some(Self::Like),
            "comment" => Some(Self::Comment),
            "follow" => Some(Self::Follow),
            "mention" => Some(Self::Mention),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user-visible notification row.
///
/// At most one active row exists per (`owner_id`, kind, `actor_id`, target)
/// within the collapse window; repeated emits inside the window update the
/// existing row and resurface it as unread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Row id (UUIDv7).
    pub id: String,
    /// The recipient.
    pub owner_id: UserId,
    /// Category.
    pub kind: NotificationKind,
    /// Who triggered it, when user-triggered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<UserId>,
    /// The content involved, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetRef>,
    /// Short headline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body text.
    pub message: String,
    /// Collaborator-defined payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Read state.
    pub is_read: bool,
    /// Creation or last-resurface time (Unix seconds).
    pub created_at: u64,
    /// Soft expiry (Unix seconds); expired rows are hidden, not deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

/// Request to emit (or collapse into) a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitRequest {
    /// The recipient.
    pub owner_id: UserId,
    /// Category.
    pub kind: NotificationKind,
    /// Who triggered it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<UserId>,
    /// The content involved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetRef>,
    /// Short headline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body text.
    pub message: String,
    /// Collaborator-defined payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Soft expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl EmitRequest {
    /// Materializes the request into a fresh notification row.
    #[must_use]
    pub fn into_notification(self, now: u64) -> Notification {
        Notification {
            id: Uuid::now_v7().to_string(),
            owner_id: self.owner_id,
            kind: self.kind,
            actor_id: self.actor_id,
            target: self.target,
            title: self.title,
            message: self.message,
            data: self.data,
            is_read: false,
            created_at: now,
            expires_at: self.expires_at,
        }
    }
}

/// Outcome of an emit: either a fresh insert or a collapse into an active row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitOutcome {
    /// Id of the row that now carries the notification.
    pub id: String,
    /// True when an active row inside the window was updated instead of a new
    /// row being inserted.
    pub collapsed: bool,
}
