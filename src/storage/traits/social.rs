//! Social graph collaborator trait.

use crate::Result;
use crate::models::UserId;
use std::collections::HashSet;

/// Read-only view of the platform's follow graph.
///
/// Edges are owned by an external collaborator; this engine only reads them
/// for audience inference and viewer flags.
pub trait SocialGraph: Send + Sync {
    /// Returns the users following `user_id`.
    fn followers_of(&self, user_id: &UserId) -> Result<Vec<UserId>>;

    /// Returns the users `user_id` follows.
    fn following_of(&self, user_id: &UserId) -> Result<Vec<UserId>>;

    /// Returns the subset of `candidates` that `viewer` follows.
    ///
    /// One batched membership lookup; feed composition attaches
    /// `is_following` flags from this set rather than issuing per-item
    /// queries.
    fn following_among(&self, viewer: &UserId, candidates: &[UserId]) -> Result<HashSet<UserId>>;
}
