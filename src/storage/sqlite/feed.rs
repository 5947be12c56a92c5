//! `FeedStore` implementation for [`SqliteStore`].

use super::{SqliteStore, acquire_lock};
use crate::models::{ActionType, FeedEntry, TargetKind, TargetRef, UserId};
use crate::storage::traits::FeedStore;
use crate::{Error, Result};
use rusqlite::params;

struct FeedRow {
    id: String,
    owner_id: String,
    actor_id: String,
    action: String,
    target_kind: String,
    target_id: String,
    data: Option<String>,
    created_at: u64,
}

impl FeedRow {
    fn into_entry(self) -> Result<FeedEntry> {
        let action = ActionType::parse(&self.action)
            .ok_or_else(|| Error::store("read_feed_entry", format!("bad action '{}'", self.action)))?;
        let kind = TargetKind::parse(&self.target_kind).ok_or_else(|| {
            Error::store("read_feed_entry", format!("bad kind '{}'", self.target_kind))
        })?;
        let data = match self.data {
            Some(raw) => {
                Some(serde_json::from_str(&raw).map_err(|e| Error::store("read_feed_entry", e))?)
            },
            None => None,
        };
        Ok(FeedEntry {
            id: self.id,
            owner_id: UserId::new(self.owner_id),
            actor_id: UserId::new(self.actor_id),
            action,
            target: TargetRef::new(kind, self.target_id),
            data,
            created_at: self.created_at,
        })
    }
}

impl FeedStore for SqliteStore {
    fn insert_entries(&self, entries: &[FeedEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| Error::store("insert_entries", e))?;

        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO feed_entry
                       (id, owner_id, actor_id, action, target_kind, target_id, data, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(|e| Error::store("insert_entries", e))?;
            for entry in entries {
                let data = entry
                    .data
                    .as_ref()
                    .map(|v| {
                        serde_json::to_string(v).map_err(|e| Error::store("insert_entries", e))
                    })
                    .transpose()?;
                stmt.execute(params![
                    entry.id,
                    entry.owner_id.as_str(),
                    entry.actor_id.as_str(),
                    entry.action.as_str(),
                    entry.target.kind.as_str(),
                    entry.target.id,
                    data,
                    entry.created_at,
                ])
                .map_err(|e| Error::store("insert_entries", e))?;
            }
        }

        tx.commit().map_err(|e| Error::store("insert_entries", e))
    }

    fn prune_owner(&self, owner_id: &UserId, cap: usize) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        // UUIDv7 ids are time-ordered, so the id tiebreak keeps same-second
        // entries in insert order.
        conn.execute(
            "DELETE FROM feed_entry
             WHERE owner_id = ?1 AND id NOT IN (
                 SELECT id FROM feed_entry
                 WHERE owner_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2
             )",
            params![owner_id.as_str(), cap as u64],
        )
        .map_err(|e| Error::store("prune_owner", e))
    }

    fn entries_for(
        &self,
        owner_id: &UserId,
        page: usize,
        limit: usize,
    ) -> Result<(Vec<FeedEntry>, u64)> {
        let conn = acquire_lock(&self.conn);
        let offset = page.saturating_sub(1).saturating_mul(limit);

        let mut stmt = conn
            .prepare_cached(
                "SELECT id, owner_id, actor_id, action, target_kind, target_id, data, created_at
                 FROM feed_entry
                 WHERE owner_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2 OFFSET ?3",
            )
            .map_err(|e| Error::store("entries_for", e))?;
        let rows = stmt
            .query_map(
                params![owner_id.as_str(), limit as u64, offset as u64],
                |row| {
                    Ok(FeedRow {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        actor_id: row.get(2)?,
                        action: row.get(3)?,
                        target_kind: row.get(4)?,
                        target_id: row.get(5)?,
                        data: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                },
            )
            .map_err(|e| Error::store("entries_for", e))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| Error::store("entries_for", e))?.into_entry()?);
        }

        let total = conn
            .query_row(
                "SELECT COUNT(*) FROM feed_entry WHERE owner_id = ?1",
                params![owner_id.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| Error::store("entries_for", e))?;

        Ok((entries, total))
    }

    fn count_for(&self, owner_id: &UserId) -> Result<u64> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT COUNT(*) FROM feed_entry WHERE owner_id = ?1",
            params![owner_id.as_str()],
            |row| row.get(0),
        )
        .map_err(|e| Error::store("count_for", e))
    }
}
