//! `ScoreStore` implementation for [`SqliteStore`].

use super::{SqliteStore, acquire_lock};
use crate::models::{ScoreRecord, TargetKind, TrendingPeriod};
use crate::storage::traits::ScoreStore;
use crate::{Error, Result};
use rusqlite::{Connection, params};
use std::collections::HashMap;

/// Raw row shape before enum parsing.
struct ScoreRow {
    kind: String,
    target_id: String,
    period: String,
    score: f64,
    rank: u32,
    data: Option<String>,
    computed_at: u64,
    expires_at: u64,
}

impl ScoreRow {
    fn into_record(self) -> Result<ScoreRecord> {
        let kind = TargetKind::parse(&self.kind)
            .ok_or_else(|| Error::store("read_score_record", format!("bad kind '{}'", self.kind)))?;
        let period = TrendingPeriod::parse(&self.period).ok_or_else(|| {
            Error::store("read_score_record", format!("bad period '{}'", self.period))
        })?;
        let data = match self.data {
            Some(raw) => Some(
                serde_json::from_str(&raw).map_err(|e| Error::store("read_score_record", e))?,
            ),
            None => None,
        };
        Ok(ScoreRecord {
            kind,
            target_id: self.target_id,
            period,
            score: self.score,
            rank: self.rank,
            data,
            computed_at: self.computed_at,
            expires_at: self.expires_at,
        })
    }
}

/// Reads the current generation for a period, defaulting to 0.
fn current_generation(conn: &Connection, period: TrendingPeriod) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE((SELECT current FROM score_generation WHERE period = ?1), 0)",
        params![period.as_str()],
        |row| row.get(0),
    )
    .map_err(|e| Error::store("current_generation", e))
}

fn serialize_data(record: &ScoreRecord) -> Result<Option<String>> {
    record
        .data
        .as_ref()
        .map(|v| serde_json::to_string(v).map_err(|e| Error::store("serialize_score_data", e)))
        .transpose()
}

impl ScoreStore for SqliteStore {
    fn upsert_scores(&self, records: &[ScoreRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| Error::store("upsert_scores", e))?;

        // Generation is looked up once per period touched by the batch.
        let mut generations: HashMap<TrendingPeriod, i64> = HashMap::new();
        for record in records {
            let generation = match generations.get(&record.period) {
                Some(g) => *g,
                None => {
                    let g = current_generation(&tx, record.period)?;
                    generations.insert(record.period, g);
                    g
                },
            };
            let data = serialize_data(record)?;
            tx.execute(
                "INSERT INTO score_record
                   (kind, target_id, period, score, rank, data, computed_at, expires_at, generation)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT (kind, target_id, period, generation) DO UPDATE SET
                   score = excluded.score,
                   rank = excluded.rank,
                   data = excluded.data,
                   computed_at = excluded.computed_at,
                   expires_at = excluded.expires_at",
                params![
                    record.kind.as_str(),
                    record.target_id,
                    record.period.as_str(),
                    record.score,
                    record.rank,
                    data,
                    record.computed_at,
                    record.expires_at,
                    generation,
                ],
            )
            .map_err(|e| Error::store("upsert_scores", e))?;
        }

        tx.commit().map_err(|e| Error::store("upsert_scores", e))
    }

    fn swap_generation(&self, period: TrendingPeriod, records: &[ScoreRecord]) -> Result<()> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| Error::store("swap_generation", e))?;

        let next = current_generation(&tx, period)? + 1;

        for record in records {
            let data = serialize_data(record)?;
            tx.execute(
                "INSERT INTO score_record
                   (kind, target_id, period, score, rank, data, computed_at, expires_at, generation)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.kind.as_str(),
                    record.target_id,
                    period.as_str(),
                    record.score,
                    record.rank,
                    data,
                    record.computed_at,
                    record.expires_at,
                    next,
                ],
            )
            .map_err(|e| Error::store("swap_generation", e))?;
        }

        // The pointer flip makes the staged set visible; the superseded
        // generation is removed in the same transaction.
        tx.execute(
            "INSERT INTO score_generation (period, current) VALUES (?1, ?2)
             ON CONFLICT (period) DO UPDATE SET current = excluded.current",
            params![period.as_str(), next],
        )
        .map_err(|e| Error::store("swap_generation", e))?;

        tx.execute(
            "DELETE FROM score_record WHERE period = ?1 AND generation < ?2",
            params![period.as_str(), next],
        )
        .map_err(|e| Error::store("swap_generation", e))?;

        tx.commit().map_err(|e| Error::store("swap_generation", e))
    }

    fn ranked(
        &self,
        kind: Option<TargetKind>,
        period: TrendingPeriod,
        limit: usize,
        now: u64,
    ) -> Result<Vec<ScoreRecord>> {
        let conn = acquire_lock(&self.conn);
        let generation = current_generation(&conn, period)?;

        let mut sql = String::from(
            "SELECT kind, target_id, period, score, rank, data, computed_at, expires_at
             FROM score_record
             WHERE period = ?1 AND generation = ?2 AND expires_at >= ?3",
        );
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(period.as_str()),
            Box::new(generation),
            Box::new(now),
        ];
        if let Some(kind) = kind {
            sql.push_str(" AND kind = ?4");
            bound.push(Box::new(kind.as_str()));
        }
        sql.push_str(" ORDER BY rank ASC LIMIT ?");
        sql.push_str(&(bound.len() + 1).to_string());
        bound.push(Box::new(limit as u64));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::store("ranked", e))?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();
        let rows = stmt
            .query_map(params_ref.as_slice(), |row| {
                Ok(ScoreRow {
                    kind: row.get(0)?,
                    target_id: row.get(1)?,
                    period: row.get(2)?,
                    score: row.get(3)?,
                    rank: row.get(4)?,
                    data: row.get(5)?,
                    computed_at: row.get(6)?,
                    expires_at: row.get(7)?,
                })
            })
            .map_err(|e| Error::store("ranked", e))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|e| Error::store("ranked", e))?.into_record()?);
        }
        Ok(records)
    }

    fn count_by_kind(
        &self,
        period: TrendingPeriod,
        now: u64,
    ) -> Result<HashMap<TargetKind, usize>> {
        let conn = acquire_lock(&self.conn);
        let generation = current_generation(&conn, period)?;

        let mut stmt = conn
            .prepare(
                "SELECT kind, COUNT(*) FROM score_record
                 WHERE period = ?1 AND generation = ?2 AND expires_at >= ?3
                 GROUP BY kind",
            )
            .map_err(|e| Error::store("count_by_kind", e))?;
        let rows = stmt
            .query_map(params![period.as_str(), generation, now], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?))
            })
            .map_err(|e| Error::store("count_by_kind", e))?;

        let mut counts = HashMap::new();
        for row in rows {
            let (kind, count) = row.map_err(|e| Error::store("count_by_kind", e))?;
            if let Some(kind) = TargetKind::parse(&kind) {
                counts.insert(kind, count);
            }
        }
        Ok(counts)
    }

    fn purge_expired_scores(&self, now: u64) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        conn.execute("DELETE FROM score_record WHERE expires_at < ?1", params![now])
            .map_err(|e| Error::store("purge_expired_scores", e))
    }

    fn count_expired_scores(&self, now: u64) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT COUNT(*) FROM score_record WHERE expires_at < ?1",
            params![now],
            |row| row.get(0),
        )
        .map_err(|e| Error::store("count_expired_scores", e))
    }

    fn purge_stale_generations(&self) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "DELETE FROM score_record
             WHERE generation <> COALESCE(
                (SELECT current FROM score_generation g WHERE g.period = score_record.period), 0)",
            [],
        )
        .map_err(|e| Error::store("purge_stale_generations", e))
    }

    fn count_stale_generations(&self) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT COUNT(*) FROM score_record
             WHERE generation <> COALESCE(
                (SELECT current FROM score_generation g WHERE g.period = score_record.period), 0)",
            [],
            |row| row.get(0),
        )
        .map_err(|e| Error::store("count_stale_generations", e))
    }
}
