//! Activity feed store trait.

use crate::Result;
use crate::models::{FeedEntry, UserId};

/// Store for materialized per-recipient activity feed entries.
pub trait FeedStore: Send + Sync {
    /// Inserts a batch of entries in one transaction.
    ///
    /// The batch either lands whole or not at all; fan-out callers chunk their
    /// audience so a mid-fanout failure yields partial *delivery*, never a
    /// partially written chunk.
    fn insert_entries(&self, entries: &[FeedEntry]) -> Result<()>;

    /// Prunes an owner's feed down to `cap` entries, deleting oldest-first.
    /// Returns the number removed.
    fn prune_owner(&self, owner_id: &UserId, cap: usize) -> Result<usize>;

    /// Returns one page of an owner's feed, newest-first, plus the owner's
    /// total entry count.
    fn entries_for(
        &self,
        owner_id: &UserId,
        page: usize,
        limit: usize,
    ) -> Result<(Vec<FeedEntry>, u64)>;

    /// Returns the number of stored entries for an owner.
    fn count_for(&self, owner_id: &UserId) -> Result<u64>;
}
