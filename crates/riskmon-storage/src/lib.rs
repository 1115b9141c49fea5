//! Persistence layer for risk events.
//!
//! The default implementation ([`sqlite::SqliteRiskStore`]) keeps a single
//! SQLite database in WAL mode. Deduplication is enforced at the storage
//! level: the event id is the table's primary key and inserts are
//! insert-if-absent, so a check-then-insert race cannot produce duplicates.

pub mod sqlite;

#[cfg(test)]
mod tests;

use anyhow::Result;
use chrono::{DateTime, Utc};
use riskmon_common::types::{RiskEvent, RiskLevel, RiskMetadata, RiskType};
use std::collections::HashMap;

/// A persisted risk event, the detection shape plus lifecycle columns.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RiskEventRecord {
    pub id: String,
    pub risk_type: RiskType,
    pub level: RiskLevel,
    pub title: String,
    pub description: String,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub actions: Vec<String>,
    pub metadata: Option<RiskMetadata>,
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RiskEventRecord {
    /// Converts the record back into the detection shape, used when a
    /// persisted window is forwarded to the notifier.
    pub fn to_event(&self) -> RiskEvent {
        RiskEvent {
            id: self.id.clone(),
            risk_type: self.risk_type,
            level: self.level,
            title: self.title.clone(),
            description: self.description.clone(),
            value: self.value,
            threshold: self.threshold,
            timestamp: self.timestamp,
            resolved: self.resolved,
            actions: self.actions.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Aggregated event counts over a time window.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct WindowCounts {
    pub total: u64,
    pub unresolved: u64,
    /// Unresolved events in the window, grouped by severity level.
    pub by_level: HashMap<String, u64>,
    /// Unresolved events in the window, grouped by risk type.
    pub by_type: HashMap<String, u64>,
}

/// Outcome of a resolve attempt, so callers can branch without relying on
/// error types for "not found".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStatus {
    /// The event existed, was unresolved, and is now resolved.
    Resolved,
    /// The event exists but was resolved earlier; nothing was mutated.
    AlreadyResolved,
    /// No event with that id exists.
    NotFound,
}

/// Persistence backend for risk events.
///
/// Implementations must be safe to share across threads (`Send + Sync`)
/// because the store is reached from scan workers and the administrative
/// surface concurrently. Mutating operations on the same event id are
/// serialized by the backend.
pub trait RiskEventStore: Send + Sync {
    /// Inserts the event unless a record with the same id already exists.
    /// Returns `true` when a new row was written, `false` on a duplicate;
    /// an existing record is never modified.
    fn insert(&self, event: &RiskEvent) -> Result<bool>;

    /// Fetches a single record by id.
    fn get(&self, id: &str) -> Result<Option<RiskEventRecord>>;

    /// Returns unresolved events, newest first, capped at `limit`.
    fn unresolved(&self, limit: usize) -> Result<Vec<RiskEventRecord>>;

    /// Returns events of the given severity level, newest first.
    fn by_level(&self, level: RiskLevel, unresolved_only: bool) -> Result<Vec<RiskEventRecord>>;

    /// Marks the event resolved, setting `resolved_at`/`resolved_by`
    /// together exactly once.
    fn resolve(&self, id: &str, resolved_by: &str) -> Result<ResolveStatus>;

    /// Flags the given events as notified, in one transaction for the whole
    /// batch. Returns the number of rows updated.
    fn mark_email_sent(&self, ids: &[String]) -> Result<usize>;

    /// Aggregated counts for events with `timestamp >= since`.
    fn window_counts(&self, since: DateTime<Utc>) -> Result<WindowCounts>;

    /// All events with `timestamp >= since`, newest first.
    fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<RiskEventRecord>>;

    /// Deletes resolved events whose `resolved_at` is older than `cutoff`.
    /// Unresolved events are never deleted regardless of age. Returns the
    /// number of rows removed.
    fn delete_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
