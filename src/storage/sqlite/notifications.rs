//! `NotificationStore` implementation for [`SqliteStore`].

use super::{SqliteStore, acquire_lock};
use crate::models::{EmitOutcome, Notification, NotificationKind, TargetKind, TargetRef, UserId};
use crate::storage::traits::NotificationStore;
use crate::{Error, Result};
use rusqlite::{OptionalExtension, params};

struct NotificationRow {
    id: String,
    owner_id: String,
    kind: String,
    actor_id: Option<String>,
    target_kind: Option<String>,
    target_id: Option<String>,
    title: Option<String>,
    message: String,
    data: Option<String>,
    is_read: bool,
    created_at: u64,
    expires_at: Option<u64>,
}

impl NotificationRow {
    fn into_notification(self) -> Result<Notification> {
        let kind = NotificationKind::parse(&self.kind)
            .ok_or_else(|| Error::store("read_notification", format!("bad kind '{}'", self.kind)))?;
        let target = match (self.target_kind, self.target_id) {
            (Some(kind_str), Some(id)) => {
                let target_kind = TargetKind::parse(&kind_str).ok_or_else(|| {
                    Error::store("read_notification", format!("bad target kind '{kind_str}'"))
                })?;
                Some(TargetRef::new(target_kind, id))
            },
            _ => None,
        };
        let data = match self.data {
            Some(raw) => {
                Some(serde_json::from_str(&raw).map_err(|e| Error::store("read_notification", e))?)
            },
            None => None,
        };
        Ok(Notification {
            id: self.id,
            owner_id: UserId::new(self.owner_id),
            kind,
            actor_id: self.actor_id.map(UserId::new),
            target,
            title: self.title,
            message: self.message,
            data,
            is_read: self.is_read,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

impl NotificationStore for SqliteStore {
    fn upsert_collapsed(
        &self,
        notification: &Notification,
        window_secs: u64,
    ) -> Result<EmitOutcome> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| Error::store("upsert_collapsed", e))?;

        let cutoff = notification.created_at.saturating_sub(window_secs);
        let data = notification
            .data
            .as_ref()
            .map(|v| serde_json::to_string(v).map_err(|e| Error::store("upsert_collapsed", e)))
            .transpose()?;
        let actor = notification.actor_id.as_ref().map(UserId::as_str);
        let target_kind = notification.target.as_ref().map(|t| t.kind.as_str());
        let target_id = notification.target.as_ref().map(|t| t.id.as_str());

        // `IS ?` matches NULL keys exactly, so ownerless/targetless
        // notifications collapse against their own kind too. The update and
        // the fallback insert share one transaction; concurrent emits for the
        // same key cannot both insert.
        let collapsed_id: Option<String> = tx
            .query_row(
                "UPDATE notification SET
                    title = ?1, message = ?2, data = ?3, is_read = 0,
                    created_at = ?4, expires_at = ?5
                 WHERE id = (
                     SELECT id FROM notification
                     WHERE owner_id = ?6 AND kind = ?7
                       AND actor_id IS ?8 AND target_kind IS ?9 AND target_id IS ?10
                       AND created_at >= ?11
                     ORDER BY created_at DESC
                     LIMIT 1
                 )
                 RETURNING id",
                params![
                    notification.title,
                    notification.message,
                    data,
                    notification.created_at,
                    notification.expires_at,
                    notification.owner_id.as_str(),
                    notification.kind.as_str(),
                    actor,
                    target_kind,
                    target_id,
                    cutoff,
                ],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::store("upsert_collapsed", e))?;

        let outcome = if let Some(id) = collapsed_id {
            EmitOutcome {
                id,
                collapsed: true,
            }
        } else {
            tx.execute(
                "INSERT INTO notification
                   (id, owner_id, kind, actor_id, target_kind, target_id,
                    title, message, data, is_read, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11)",
                params![
                    notification.id,
                    notification.owner_id.as_str(),
                    notification.kind.as_str(),
                    actor,
                    target_kind,
                    target_id,
                    notification.title,
                    notification.message,
                    data,
                    notification.created_at,
                    notification.expires_at,
                ],
            )
            .map_err(|e| Error::store("upsert_collapsed", e))?;
            EmitOutcome {
                id: notification.id.clone(),
                collapsed: false,
            }
        };

        tx.commit()
            .map_err(|e| Error::store("upsert_collapsed", e))?;
        Ok(outcome)
    }

    fn mark_read(&self, owner_id: &UserId, ids: Option<&[String]>) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        match ids {
            None => conn
                .execute(
                    "UPDATE notification SET is_read = 1 WHERE owner_id = ?1 AND is_read = 0",
                    params![owner_id.as_str()],
                )
                .map_err(|e| Error::store("mark_read", e)),
            Some([]) => Ok(0),
            Some(ids) => {
                let placeholders: Vec<String> =
                    (0..ids.len()).map(|i| format!("?{}", i + 2)).collect();
                let sql = format!(
                    "UPDATE notification SET is_read = 1
                     WHERE owner_id = ?1 AND is_read = 0 AND id IN ({})",
                    placeholders.join(", ")
                );
                let owner = owner_id.as_str();
                let mut bound: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(ids.len() + 1);
                bound.push(&owner);
                for id in ids {
                    bound.push(id);
                }
                conn.execute(&sql, bound.as_slice())
                    .map_err(|e| Error::store("mark_read", e))
            },
        }
    }

    fn list(
        &self,
        owner_id: &UserId,
        unread_only: bool,
        page: usize,
        limit: usize,
        now: u64,
    ) -> Result<(Vec<Notification>, u64)> {
        let conn = acquire_lock(&self.conn);
        let offset = page.saturating_sub(1).saturating_mul(limit);
        let read_clause = if unread_only { "AND is_read = 0" } else { "" };

        let sql = format!(
            "SELECT id, owner_id, kind, actor_id, target_kind, target_id,
                    title, message, data, is_read, created_at, expires_at
             FROM notification
             WHERE owner_id = ?1 AND (expires_at IS NULL OR expires_at >= ?2) {read_clause}
             ORDER BY created_at DESC, id DESC
             LIMIT ?3 OFFSET ?4"
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| Error::store("list", e))?;
        let rows = stmt
            .query_map(
                params![owner_id.as_str(), now, limit as u64, offset as u64],
                |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        kind: row.get(2)?,
                        actor_id: row.get(3)?,
                        target_kind: row.get(4)?,
                        target_id: row.get(5)?,
                        title: row.get(6)?,
                        message: row.get(7)?,
                        data: row.get(8)?,
                        is_read: row.get(9)?,
                        created_at: row.get(10)?,
                        expires_at: row.get(11)?,
                    })
                },
            )
            .map_err(|e| Error::store("list", e))?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row.map_err(|e| Error::store("list", e))?.into_notification()?);
        }

        let count_sql = format!(
            "SELECT COUNT(*) FROM notification
             WHERE owner_id = ?1 AND (expires_at IS NULL OR expires_at >= ?2) {read_clause}"
        );
        let total = conn
            .query_row(&count_sql, params![owner_id.as_str(), now], |row| row.get(0))
            .map_err(|e| Error::store("list", e))?;

        Ok((notifications, total))
    }

    fn unread_count(&self, owner_id: &UserId, now: u64) -> Result<u64> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT COUNT(*) FROM notification
             WHERE owner_id = ?1 AND is_read = 0 AND (expires_at IS NULL OR expires_at >= ?2)",
            params![owner_id.as_str(), now],
            |row| row.get(0),
        )
        .map_err(|e| Error::store("unread_count", e))
    }

    fn purge_expired_notifications(&self, now: u64) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "DELETE FROM notification WHERE expires_at IS NOT NULL AND expires_at < ?1",
            params![now],
        )
        .map_err(|e| Error::store("purge_expired_notifications", e))
    }

    fn count_expired_notifications(&self, now: u64) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT COUNT(*) FROM notification WHERE expires_at IS NOT NULL AND expires_at < ?1",
            params![now],
            |row| row.get(0),
        )
        .map_err(|e| Error::store("count_expired_notifications", e))
    }
}
