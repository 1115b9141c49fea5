use crate::{ResolveStatus, RiskEventRecord, RiskEventStore, WindowCounts};
use anyhow::Result;
use chrono::{DateTime, Utc};
use riskmon_common::types::{RiskEvent, RiskLevel, RiskMetadata, RiskType};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const RISK_EVENTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS risk_events (
    id TEXT PRIMARY KEY,
    risk_type TEXT NOT NULL,
    level TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    value REAL NOT NULL,
    threshold REAL NOT NULL,
    timestamp INTEGER NOT NULL,
    resolved INTEGER NOT NULL DEFAULT 0,
    resolved_at INTEGER,
    resolved_by TEXT,
    actions TEXT NOT NULL DEFAULT '[]',
    metadata TEXT,
    email_sent INTEGER NOT NULL DEFAULT 0,
    email_sent_at INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_risk_events_time ON risk_events(timestamp);
CREATE INDEX IF NOT EXISTS idx_risk_events_resolved ON risk_events(resolved);
CREATE INDEX IF NOT EXISTS idx_risk_events_level ON risk_events(level);
";

const RECORD_COLUMNS: &str = "id, risk_type, level, title, description, value, threshold, \
     timestamp, resolved, resolved_at, resolved_by, actions, metadata, \
     email_sent, email_sent_at, created_at, updated_at";

/// SQLite-backed risk event store.
///
/// A single database file holds the whole event history; the `id` primary
/// key is the dedup constraint. All access goes through one connection
/// behind a mutex, which also serializes mutations on the same event id.
pub struct SqliteRiskStore {
    conn: Mutex<Connection>,
}

impl SqliteRiskStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(RISK_EVENTS_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests and throwaway environments.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(RISK_EVENTS_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RiskEventRecord> {
    let risk_type: String = row.get(1)?;
    let level: String = row.get(2)?;
    let ts_ms: i64 = row.get(7)?;
    let resolved_ms: Option<i64> = row.get(9)?;
    let actions_json: String = row.get(11)?;
    let metadata_json: Option<String> = row.get(12)?;
    let email_ms: Option<i64> = row.get(14)?;
    let created_ms: i64 = row.get(15)?;
    let updated_ms: i64 = row.get(16)?;

    Ok(RiskEventRecord {
        id: row.get(0)?,
        risk_type: risk_type.parse().unwrap_or(RiskType::System),
        level: level.parse().unwrap_or(RiskLevel::Low),
        title: row.get(3)?,
        description: row.get(4)?,
        value: row.get(5)?,
        threshold: row.get(6)?,
        timestamp: DateTime::from_timestamp_millis(ts_ms).unwrap_or_default(),
        resolved: row.get::<_, i64>(8)? != 0,
        resolved_at: resolved_ms.and_then(DateTime::from_timestamp_millis),
        resolved_by: row.get(10)?,
        actions: serde_json::from_str(&actions_json).unwrap_or_default(),
        metadata: metadata_json.and_then(|json| serde_json::from_str::<RiskMetadata>(&json).ok()),
        email_sent: row.get::<_, i64>(13)? != 0,
        email_sent_at: email_ms.and_then(DateTime::from_timestamp_millis),
        created_at: DateTime::from_timestamp_millis(created_ms).unwrap_or_default(),
        updated_at: DateTime::from_timestamp_millis(updated_ms).unwrap_or_default(),
    })
}

impl RiskEventStore for SqliteRiskStore {
    fn insert(&self, event: &RiskEvent) -> Result<bool> {
        let conn = self.lock_conn();
        let now_ms = Utc::now().timestamp_millis();
        let actions_json = serde_json::to_string(&event.actions)?;
        let metadata_json = event
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        // INSERT OR IGNORE against the primary key is the dedup: a second
        // store of the same id changes nothing.
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO risk_events
             (id, risk_type, level, title, description, value, threshold, timestamp,
              resolved, actions, metadata, email_sent, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, ?12, ?12)",
            rusqlite::params![
                &event.id,
                event.risk_type.to_string(),
                event.level.to_string(),
                &event.title,
                &event.description,
                event.value,
                event.threshold,
                event.timestamp.timestamp_millis(),
                event.resolved,
                actions_json,
                metadata_json,
                now_ms,
            ],
        )?;
        Ok(inserted > 0)
    }

    fn get(&self, id: &str) -> Result<Option<RiskEventRecord>> {
        let conn = self.lock_conn();
        let sql = format!("SELECT {RECORD_COLUMNS} FROM risk_events WHERE id = ?1");
        let record = conn
            .query_row(&sql, [id], record_from_row)
            .optional()?;
        Ok(record)
    }

    fn unresolved(&self, limit: usize) -> Result<Vec<RiskEventRecord>> {
        let conn = self.lock_conn();
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM risk_events
             WHERE resolved = 0 ORDER BY timestamp DESC LIMIT ?1"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map([limit as i64], record_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn by_level(&self, level: RiskLevel, unresolved_only: bool) -> Result<Vec<RiskEventRecord>> {
        let conn = self.lock_conn();
        let sql = if unresolved_only {
            format!(
                "SELECT {RECORD_COLUMNS} FROM risk_events
                 WHERE level = ?1 AND resolved = 0 ORDER BY timestamp DESC"
            )
        } else {
            format!(
                "SELECT {RECORD_COLUMNS} FROM risk_events
                 WHERE level = ?1 ORDER BY timestamp DESC"
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([level.to_string()], record_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn resolve(&self, id: &str, resolved_by: &str) -> Result<ResolveStatus> {
        let conn = self.lock_conn();
        let now_ms = Utc::now().timestamp_millis();

        // The resolved guard makes the transition single-shot: resolution
        // fields are written together, at most once.
        let updated = conn.execute(
            "UPDATE risk_events
             SET resolved = 1, resolved_at = ?1, resolved_by = ?2, updated_at = ?1
             WHERE id = ?3 AND resolved = 0",
            rusqlite::params![now_ms, resolved_by, id],
        )?;
        if updated > 0 {
            return Ok(ResolveStatus::Resolved);
        }

        let exists = conn
            .query_row("SELECT 1 FROM risk_events WHERE id = ?1", [id], |_| Ok(()))
            .optional()?
            .is_some();
        if exists {
            Ok(ResolveStatus::AlreadyResolved)
        } else {
            Ok(ResolveStatus::NotFound)
        }
    }

    fn mark_email_sent(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.lock_conn();
        let now_ms = Utc::now().timestamp_millis();
        let tx = conn.unchecked_transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare_cached(
                "UPDATE risk_events
                 SET email_sent = 1, email_sent_at = ?1, updated_at = ?1
                 WHERE id = ?2",
            )?;
            for id in ids {
                updated += stmt.execute(rusqlite::params![now_ms, id])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    fn window_counts(&self, since: DateTime<Utc>) -> Result<WindowCounts> {
        let conn = self.lock_conn();
        let since_ms = since.timestamp_millis();

        let total: u64 = conn.query_row(
            "SELECT COUNT(*) FROM risk_events WHERE timestamp >= ?1",
            [since_ms],
            |row| row.get(0),
        )?;
        let unresolved: u64 = conn.query_row(
            "SELECT COUNT(*) FROM risk_events WHERE timestamp >= ?1 AND resolved = 0",
            [since_ms],
            |row| row.get(0),
        )?;

        let mut by_level = HashMap::new();
        let mut stmt = conn.prepare_cached(
            "SELECT level, COUNT(*) FROM risk_events
             WHERE timestamp >= ?1 AND resolved = 0 GROUP BY level",
        )?;
        let rows = stmt.query_map([since_ms], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;
        for row in rows {
            let (level, count) = row?;
            by_level.insert(level, count);
        }

        let mut by_type = HashMap::new();
        let mut stmt = conn.prepare_cached(
            "SELECT risk_type, COUNT(*) FROM risk_events
             WHERE timestamp >= ?1 AND resolved = 0 GROUP BY risk_type",
        )?;
        let rows = stmt.query_map([since_ms], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;
        for row in rows {
            let (risk_type, count) = row?;
            by_type.insert(risk_type, count);
        }

        Ok(WindowCounts {
            total,
            unresolved,
            by_level,
            by_type,
        })
    }

    fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<RiskEventRecord>> {
        let conn = self.lock_conn();
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM risk_events
             WHERE timestamp >= ?1 ORDER BY timestamp DESC"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map([since.timestamp_millis()], record_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn delete_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let conn = self.lock_conn();
        let tx = conn.unchecked_transaction()?;
        let deleted = tx.execute(
            "DELETE FROM risk_events WHERE resolved = 1 AND resolved_at < ?1",
            [cutoff.timestamp_millis()],
        )?;
        tx.commit()?;
        if deleted > 0 {
            tracing::info!(count = deleted, "Purged old resolved risk events");
        }
        Ok(deleted as u64)
    }
}
