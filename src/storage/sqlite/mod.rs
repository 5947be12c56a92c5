//! `SQLite` reference backend.
//!
//! Implements [`ScoreStore`](crate::storage::ScoreStore),
//! [`FeedStore`](crate::storage::FeedStore), and
//! [`NotificationStore`](crate::storage::NotificationStore) on one connection.
//! The behavioral contract (dense ranks, generation swap, windowed collapse,
//! retention caps) lives in the traits; any relational or document store
//! satisfying it could be swapped in.

mod feed;
mod notifications;
mod scores;

use crate::{Error, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Helper to acquire the connection lock with poison recovery.
///
/// If the mutex is poisoned by a panic in a previous critical section, the
/// inner value is recovered and a warning logged; the connection state itself
/// is still valid.
pub(crate) fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// SQLite-backed store for scores, feed entries, and notifications.
pub struct SqliteStore {
    /// Connection to the `SQLite` database.
    pub(crate) conn: Mutex<Connection>,
    /// Path to the `SQLite` database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Creates a new `SQLite` store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(|e| Error::store("open_sqlite", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };

        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| Error::store("open_sqlite_memory", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };

        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Initializes the database schema.
    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        // WAL mode for better concurrent read performance. pragma_update
        // returns the new mode string which would trip execute_batch, so the
        // result is ignored deliberately.
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");

        // Uniqueness of (kind, target_id, period) holds among *visible* rows;
        // the generation column participates in the key so a forced rebuild
        // can stage a complete replacement set before the pointer flips.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS score_record (
                kind TEXT NOT NULL,
                target_id TEXT NOT NULL,
                period TEXT NOT NULL,
                score REAL NOT NULL,
                rank INTEGER NOT NULL,
                data TEXT,
                computed_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                generation INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (kind, target_id, period, generation)
            )",
            [],
        )
        .map_err(|e| Error::store("create_score_record_table", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS score_generation (
                period TEXT PRIMARY KEY,
                current INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| Error::store("create_score_generation_table", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS feed_entry (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                action TEXT NOT NULL,
                target_kind TEXT NOT NULL,
                target_id TEXT NOT NULL,
                data TEXT,
                created_at INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| Error::store("create_feed_entry_table", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS notification (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                actor_id TEXT,
                target_kind TEXT,
                target_id TEXT,
                title TEXT,
                message TEXT NOT NULL,
                data TEXT,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                expires_at INTEGER
            )",
            [],
        )
        .map_err(|e| Error::store("create_notification_table", e))?;

        Self::create_indexes(&conn);

        Ok(())
    }

    /// Creates indexes for the common query patterns.
    fn create_indexes(conn: &Connection) {
        // Rank-ordered trending reads per period
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_score_period_rank
             ON score_record(period, generation, rank)",
            [],
        );

        // Feed reads and FIFO pruning per owner
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_feed_owner_created
             ON feed_entry(owner_id, created_at DESC)",
            [],
        );

        // Notification listings per owner
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_notification_owner_created
             ON notification(owner_id, created_at DESC)",
            [],
        );

        // Collapse-window lookups
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_notification_collapse
             ON notification(owner_id, kind, actor_id, target_kind, target_id, created_at)",
            [],
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_initializes() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.db_path().is_none());
    }

    #[test]
    fn test_on_disk_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.db");
        {
            let store = SqliteStore::new(&path).unwrap();
            assert_eq!(store.db_path(), Some(path.as_path()));
        }
        // Schema creation is idempotent across reopen
        let store = SqliteStore::new(&path).unwrap();
        assert!(store.db_path().is_some());
    }
}
