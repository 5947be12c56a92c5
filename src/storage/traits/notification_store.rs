//! Notification store trait.

use crate::Result;
use crate::models::{EmitOutcome, Notification, UserId};

/// Store for user notifications with windowed collapse.
pub trait NotificationStore: Send + Sync {
    /// Atomically collapses-or-inserts a notification.
    ///
    /// If an active row matching (`owner_id`, kind, `actor_id`, target) was
    /// created within `window_secs` of `notification.created_at`, that row is
    /// updated in place: title/message/data replaced, `is_read` reset to
    /// false, `created_at` bumped. Otherwise `notification` is inserted as-is.
    /// The check and the write happen in a single transaction; two concurrent
    /// emits for the same key cannot both insert.
    fn upsert_collapsed(
        &self,
        notification: &Notification,
        window_secs: u64,
    ) -> Result<EmitOutcome>;

    /// Marks notifications read. `ids = None` marks all of the owner's unread
    /// rows; otherwise only the listed ids (scoped to the owner). Returns the
    /// number transitioned.
    fn mark_read(&self, owner_id: &UserId, ids: Option<&[String]>) -> Result<usize>;

    /// Returns one page of an owner's notifications, newest-first, plus the
    /// matching total. Rows with `expires_at < now` are excluded but not
    /// deleted.
    fn list(
        &self,
        owner_id: &UserId,
        unread_only: bool,
        page: usize,
        limit: usize,
        now: u64,
    ) -> Result<(Vec<Notification>, u64)>;

    /// Returns the owner's unread count, excluding expired rows.
    fn unread_count(&self, owner_id: &UserId, now: u64) -> Result<u64>;

    /// Deletes rows with `expires_at < now`. Returns the number removed.
    fn purge_expired_notifications(&self, now: u64) -> Result<usize>;

    /// Counts rows with `expires_at < now` without deleting them.
    fn count_expired_notifications(&self, now: u64) -> Result<usize>;
}
