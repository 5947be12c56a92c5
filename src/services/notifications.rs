//! Notification emission with duplicate collapse.
//!
//! Bursts of the same (owner, kind, actor, target) inside the collapse window
//! update the existing notification in place instead of inserting a new row.
//! The update-else-insert decision is delegated to the store, which makes it
//! atomically, so concurrent emitters converge on one row.

use crate::models::{EmitOutcome, EmitRequest, Notification, UserId};
use crate::storage::traits::NotificationStore;
use crate::{Error, Result, current_timestamp};
use std::sync::Arc;
use tracing::instrument;

/// Emits, lists, and marks notifications over a [`NotificationStore`].
pub struct NotificationService<N: NotificationStore> {
    store: Arc<N>,
    window_secs: u64,
}

impl<N: NotificationStore> NotificationService<N> {
    /// Creates a new service with the given collapse window.
    #[must_use]
    pub const fn new(store: Arc<N>, window_secs: u64) -> Self {
        Self { store, window_secs }
    }

    /// Emits a notification, collapsing into a recent duplicate when one
    /// exists.
    ///
    /// A collapsed notification is resurfaced: marked unread and moved to the
    /// top of the recipient's list.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    #[instrument(
        name = "memefeed.notifications.emit",
        skip(self, request),
        fields(component = "notifications", operation = "emit", kind = %request.kind, owner = %request.owner_id)
    )]
    pub fn emit(&self, request: EmitRequest) -> Result<EmitOutcome> {
        let notification = request.into_notification(current_timestamp());
        let outcome = self.store.upsert_collapsed(&notification, self.window_secs)?;

        metrics::counter!(
            "notification_emit_total",
            "result" => if outcome.collapsed { "collapsed" } else { "inserted" }
        )
        .increment(1);
        tracing::debug!(id = %outcome.id, collapsed = outcome.collapsed, "notification emitted");
        Ok(outcome)
    }

    /// Marks notifications read. `ids = None` marks everything unread for the
    /// owner; an empty slice is a no-op. Returns how many rows changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn mark_read(&self, owner_id: &UserId, ids: Option<&[String]>) -> Result<usize> {
        self.store.mark_read(owner_id, ids)
    }

    /// Lists an owner's live notifications, newest first.
    ///
    /// Expired notifications are hidden here but only deleted by garbage
    /// collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for out-of-range pagination.
    pub fn list(
        &self,
        owner_id: &UserId,
        unread_only: bool,
        page: usize,
        limit: usize,
    ) -> Result<(Vec<Notification>, u64)> {
        if page == 0 {
            return Err(Error::validation("page", "must be at least 1"));
        }
        if limit == 0 || limit > 100 {
            return Err(Error::validation("limit", "must be between 1 and 100"));
        }
        self.store
            .list(owner_id, unread_only, page, limit, current_timestamp())
    }

    /// Returns the owner's live unread count.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn unread_count(&self, owner_id: &UserId) -> Result<u64> {
        self.store.unread_count(owner_id, current_timestamp())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{NotificationKind, TargetRef};
    use crate::storage::sqlite::SqliteStore;

    fn like_request(owner: &str, actor: &str, meme: &str) -> EmitRequest {
        EmitRequest {
            owner_id: UserId::from(owner),
            kind: NotificationKind::Like,
            actor_id: Some(UserId::from(actor)),
            target: Some(TargetRef::meme(meme)),
            title: None,
            message: format!("{actor} liked your meme"),
            data: None,
            expires_at: None,
        }
    }

    fn service(window_secs: u64) -> NotificationService<SqliteStore> {
        NotificationService::new(Arc::new(SqliteStore::in_memory().unwrap()), window_secs)
    }

    #[test]
    fn test_duplicate_burst_collapses_to_one_row() {
        let service = service(3_600);
        let first = service.emit(like_request("alice", "bob", "m1")).unwrap();
        assert!(!first.collapsed);

        let second = service.emit(like_request("alice", "bob", "m1")).unwrap();
        assert!(second.collapsed);
        assert_eq!(second.id, first.id);

        let (rows, total) = service.list(&UserId::from("alice"), false, 1, 10).unwrap();
        assert_eq!(total, 1);
        assert!(!rows[0].is_read);
    }

    #[test]
    fn test_different_actor_does_not_collapse() {
        let service = service(3_600);
        let first = service.emit(like_request("alice", "bob", "m1")).unwrap();
        let second = service.emit(like_request("alice", "carol", "m1")).unwrap();
        assert!(!second.collapsed);
        assert_ne!(second.id, first.id);
    }

    #[test]
    fn test_collapse_resurfaces_read_notification() {
        let service = service(3_600);
        let owner = UserId::from("alice");
        let first = service.emit(like_request("alice", "bob", "m1")).unwrap();
        service.mark_read(&owner, Some(&[first.id.clone()])).unwrap();
        assert_eq!(service.unread_count(&owner).unwrap(), 0);

        let second = service.emit(like_request("alice", "bob", "m1")).unwrap();
        assert!(second.collapsed);
        assert_eq!(service.unread_count(&owner).unwrap(), 1);
    }

    #[test]
    fn test_zero_window_never_collapses() {
        // window 0 means the cutoff sits at the new notification's own
        // timestamp, so only a same-second duplicate could merge; use two
        // distinct targets to keep the test deterministic either way
        let service = service(0);
        service.emit(like_request("alice", "bob", "m1")).unwrap();
        let second = service.emit(like_request("alice", "bob", "m2")).unwrap();
        assert!(!second.collapsed);
    }

    #[test]
    fn test_mark_read_none_marks_all() {
        let service = service(3_600);
        let owner = UserId::from("alice");
        service.emit(like_request("alice", "bob", "m1")).unwrap();
        service.emit(like_request("alice", "carol", "m2")).unwrap();

        let changed = service.mark_read(&owner, None).unwrap();
        assert_eq!(changed, 2);
        assert_eq!(service.unread_count(&owner).unwrap(), 0);

        // empty slice is a no-op, not mark-all
        service.emit(like_request("alice", "dave", "m3")).unwrap();
        assert_eq!(service.mark_read(&owner, Some(&[])).unwrap(), 0);
        assert_eq!(service.unread_count(&owner).unwrap(), 1);
    }

    #[test]
    fn test_list_validates_pagination() {
        let service = service(3_600);
        let owner = UserId::from("alice");
        assert!(service.list(&owner, false, 0, 10).is_err());
        assert!(service.list(&owner, false, 1, 0).is_err());
        assert!(service.list(&owner, false, 1, 101).is_err());
    }
}
