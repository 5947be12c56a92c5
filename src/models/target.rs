//! Content target and user identity types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of content entity a score, feed entry, or notification points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// A meme post.
    Meme,
    /// A hashtag.
    Tag,
    /// A meme template.
    Template,
    /// A platform user.
    User,
}

impl TargetKind {
    /// Returns all kind variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Meme, Self::Tag, Self::Template, Self::User]
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Meme => "meme",
            Self::Tag => "tag",
            Self::Template => "template",
            Self::User => "user",
        }
    }

    /// Parses a kind from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "meme" => Some(Self::Meme),
            "tag" => Some(Self::Tag),
            "template" => Some(Self::Template),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque pointer to a content entity owned by an external collaborator.
///
/// The engine never owns the pointed-at row; a `TargetRef` may go stale at any
/// time, and read paths drop stale refs silently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    /// The kind of entity pointed at.
    pub kind: TargetKind,
    /// The collaborator-side id.
    pub id: String,
}

impl TargetRef {
    /// Creates a new target reference.
    #[must_use]
    pub fn new(kind: TargetKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Creates a reference to a meme.
    #[must_use]
    pub fn meme(id: impl Into<String>) -> Self {
        Self::new(TargetKind::Meme, id)
    }

    /// Creates a reference to a user.
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(TargetKind::User, id)
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Identifier for a platform user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a new user id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Resolved presentation data for a target, served by the content catalog.
///
/// Cards are the join side of trending/feed reads: a ref that no longer
/// resolves to a card has been deleted or made private and is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetCard {
    /// The target this card describes.
    pub target: TargetRef,
    /// Owner of the content, when the kind has one (memes, templates).
    pub owner_id: Option<UserId>,
    /// Display title or username.
    pub title: Option<String>,
    /// Tags attached to the content.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation time (Unix seconds).
    pub created_at: u64,
    /// Collaborator-defined extra payload (thumbnails, counts for display).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}
