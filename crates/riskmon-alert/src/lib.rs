//! Alert management: persistence, escalation, and lifecycle of risk events.
//!
//! The [`AlertManager`] owns the persisted risk-event table through the
//! storage seam and decides when a batch warrants escalation through the
//! notifier. Operations catch storage failures locally and return safe
//! defaults; persistence is the durable side effect, notification is
//! best-effort.

#[cfg(test)]
mod tests;

use chrono::{Duration, Utc};
use riskmon_common::types::{RiskEvent, RiskLevel};
use riskmon_notify::Notifier;
use riskmon_storage::{ResolveStatus, RiskEventRecord, RiskEventStore};
use std::collections::HashMap;
use std::sync::Arc;

/// Severity at or above which a batch triggers the notifier.
const DEFAULT_ESCALATION_THRESHOLD: RiskLevel = RiskLevel::High;

/// Windowed risk statistics.
///
/// `total = resolved + unresolved` holds for any window; the per-level and
/// per-type breakdowns count unresolved events only.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RiskStatistics {
    pub period_hours: i64,
    pub total: u64,
    pub unresolved: u64,
    pub resolved: u64,
    pub by_level: HashMap<String, u64>,
    pub by_type: HashMap<String, u64>,
    pub critical_count: u64,
    pub high_count: u64,
    pub medium_count: u64,
    pub low_count: u64,
}

/// Outcome of [`AlertManager::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveOutcome {
    Resolved,
    AlreadyResolved,
    NotFound,
    StorageError,
}

impl ResolveOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolveOutcome::Resolved)
    }
}

/// Result summary of processing one scan's batch of events.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ProcessOutcome {
    /// Events newly written to the store (duplicates excluded).
    pub stored: usize,
    /// Notification batches delivered (0 or 1 per scan).
    pub emails_sent: usize,
    pub critical_count: usize,
    pub high_count: usize,
    /// Recoverable failures encountered along the way.
    pub errors: Vec<String>,
}

/// Service object coordinating the event store and the notifier.
///
/// Built once at process start and shared by reference with the scheduler
/// and the administrative surface.
pub struct AlertManager {
    store: Arc<dyn RiskEventStore>,
    notifier: Arc<dyn Notifier>,
    escalation_threshold: RiskLevel,
}

impl AlertManager {
    pub fn new(store: Arc<dyn RiskEventStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
        }
    }

    /// Stores a batch of events, suppressing duplicates by id.
    ///
    /// Per-event failures are logged and skipped; a systemic storage
    /// failure yields a stored count of 0 rather than an error.
    pub fn store_events(&self, events: &[RiskEvent]) -> usize {
        let mut stored = 0;
        for event in events {
            match self.store.insert(event) {
                Ok(true) => stored += 1,
                Ok(false) => {
                    tracing::debug!(id = %event.id, "Duplicate risk event suppressed");
                }
                Err(e) => {
                    tracing::error!(id = %event.id, error = %e, "Failed to store risk event");
                }
            }
        }
        tracing::info!(count = stored, "Stored new risk events");
        stored
    }

    /// Unresolved events, newest first, capped at `limit`.
    pub fn unresolved(&self, limit: usize) -> Vec<RiskEventRecord> {
        self.store.unresolved(limit).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to query unresolved risks");
            Vec::new()
        })
    }

    /// Events of the given severity level, newest first.
    pub fn by_level(&self, level: RiskLevel, unresolved_only: bool) -> Vec<RiskEventRecord> {
        self.store
            .by_level(level, unresolved_only)
            .unwrap_or_else(|e| {
                tracing::error!(level = %level, error = %e, "Failed to query risks by level");
                Vec::new()
            })
    }

    /// Marks a risk event resolved.
    pub fn resolve(&self, id: &str, resolved_by: &str) -> ResolveOutcome {
        match self.store.resolve(id, resolved_by) {
            Ok(ResolveStatus::Resolved) => {
                tracing::info!(id, resolved_by, "Resolved risk event");
                ResolveOutcome::Resolved
            }
            Ok(ResolveStatus::AlreadyResolved) => ResolveOutcome::AlreadyResolved,
            Ok(ResolveStatus::NotFound) => {
                tracing::warn!(id, "Risk event not found");
                ResolveOutcome::NotFound
            }
            Err(e) => {
                tracing::error!(id, error = %e, "Failed to resolve risk event");
                ResolveOutcome::StorageError
            }
        }
    }

    /// Statistics over events with `timestamp >= now - window_hours`.
    ///
    /// Returns a zeroed structure on storage failure, never an error.
    pub fn statistics(&self, window_hours: i64) -> RiskStatistics {
        let since = Utc::now() - Duration::hours(window_hours);
        match self.store.window_counts(since) {
            Ok(counts) => {
                let level_count =
                    |level: RiskLevel| counts.by_level.get(&level.to_string()).copied().unwrap_or(0);
                RiskStatistics {
                    period_hours: window_hours,
                    total: counts.total,
                    unresolved: counts.unresolved,
                    resolved: counts.total - counts.unresolved,
                    critical_count: level_count(RiskLevel::Critical),
                    high_count: level_count(RiskLevel::High),
                    medium_count: level_count(RiskLevel::Medium),
                    low_count: level_count(RiskLevel::Low),
                    by_level: counts.by_level,
                    by_type: counts.by_type,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to compute risk statistics");
                RiskStatistics {
                    period_hours: window_hours,
                    ..RiskStatistics::default()
                }
            }
        }
    }

    /// Processes one scan's batch: persist, then escalate if warranted.
    ///
    /// The notifier is invoked once for the whole batch when it contains
    /// any event at or above the escalation threshold. Only after the
    /// notifier reports success are the escalated events flagged as
    /// notified, in a single update. A notifier failure lands in `errors`
    /// and never affects the stored count.
    pub async fn process(&self, events: &[RiskEvent]) -> ProcessOutcome {
        let mut outcome = ProcessOutcome {
            stored: self.store_events(events),
            critical_count: events
                .iter()
                .filter(|e| e.level == RiskLevel::Critical)
                .count(),
            high_count: events.iter().filter(|e| e.level == RiskLevel::High).count(),
            ..ProcessOutcome::default()
        };

        let escalated: Vec<String> = events
            .iter()
            .filter(|e| e.level >= self.escalation_threshold)
            .map(|e| e.id.clone())
            .collect();
        if escalated.is_empty() {
            return outcome;
        }

        match self.notifier.send_critical_alert(events).await {
            Ok(()) => {
                outcome.emails_sent = 1;
                tracing::info!(
                    critical = outcome.critical_count,
                    high = outcome.high_count,
                    "Sent critical alert notification"
                );
                if let Err(e) = self.store.mark_email_sent(&escalated) {
                    tracing::error!(error = %e, "Failed to record notification state");
                    outcome
                        .errors
                        .push(format!("Failed to record notification state: {e}"));
                }
            }
            Err(e) => {
                tracing::error!(channel = self.notifier.channel_name(), error = %e, "Critical alert delivery failed");
                outcome.errors.push(format!("Failed to send alert: {e}"));
            }
        }

        outcome
    }

    /// Forwards the trailing-24h window to the notifier's daily report.
    pub async fn send_daily_report(&self) -> bool {
        let since = Utc::now() - Duration::hours(24);
        let records = match self.store.events_since(since) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load events for daily report");
                return false;
            }
        };

        let events: Vec<RiskEvent> = records.iter().map(RiskEventRecord::to_event).collect();
        match self.notifier.send_daily_report(&events).await {
            Ok(()) => {
                tracing::info!(count = events.len(), "Sent daily risk report");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Daily report delivery failed");
                false
            }
        }
    }

    /// Purges resolved events older than the retention cutoff.
    ///
    /// Returns the number of rows deleted, or 0 on failure.
    pub fn cleanup(&self, retention_days: i64) -> u64 {
        let cutoff = Utc::now() - Duration::days(retention_days);
        match self.store.delete_resolved_before(cutoff) {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::error!(error = %e, "Risk event cleanup failed");
                0
            }
        }
    }
}
