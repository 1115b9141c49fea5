use crate::{AlertManager, ResolveOutcome};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use riskmon_common::types::{RiskEvent, RiskLevel, RiskType};
use riskmon_notify::error::{NotifyError, Result as NotifyResult};
use riskmon_notify::Notifier;
use riskmon_storage::sqlite::SqliteRiskStore;
use riskmon_storage::{ResolveStatus, RiskEventRecord, RiskEventStore, WindowCounts};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

struct RecordingNotifier {
    fail_critical: bool,
    fail_daily: bool,
    critical_batches: Mutex<Vec<usize>>,
    daily_batches: Mutex<Vec<usize>>,
}

impl RecordingNotifier {
    fn new() -> Self {
        Self {
            fail_critical: false,
            fail_daily: false,
            critical_batches: Mutex::new(Vec::new()),
            daily_batches: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fail_critical: true,
            fail_daily: true,
            ..Self::new()
        }
    }

    fn critical_calls(&self) -> Vec<usize> {
        self.critical_batches.lock().unwrap().clone()
    }

    fn daily_calls(&self) -> Vec<usize> {
        self.daily_batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_critical_alert(&self, events: &[RiskEvent]) -> NotifyResult<()> {
        self.critical_batches.lock().unwrap().push(events.len());
        if self.fail_critical {
            Err(NotifyError::Delivery("smtp timeout".to_string()))
        } else {
            Ok(())
        }
    }

    async fn send_daily_report(&self, events: &[RiskEvent]) -> NotifyResult<()> {
        self.daily_batches.lock().unwrap().push(events.len());
        if self.fail_daily {
            Err(NotifyError::Delivery("smtp timeout".to_string()))
        } else {
            Ok(())
        }
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

fn make_event(id: &str, level: RiskLevel, ts: DateTime<Utc>) -> RiskEvent {
    RiskEvent {
        id: id.to_string(),
        risk_type: RiskType::Security,
        level,
        title: format!("Event {id}"),
        description: "test event".to_string(),
        value: 1.0,
        threshold: 0.0,
        timestamp: ts,
        resolved: false,
        actions: Vec::new(),
        metadata: None,
    }
}

fn setup(notifier: Arc<RecordingNotifier>) -> (TempDir, AlertManager) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteRiskStore::open(&dir.path().join("risk.db")).unwrap());
    (dir, AlertManager::new(store, notifier))
}

#[tokio::test]
async fn process_escalates_once_and_flags_only_high_severity() {
    let notifier = Arc::new(RecordingNotifier::new());
    let (_dir, manager) = setup(notifier.clone());
    let now = Utc::now();

    let events = vec![
        make_event("crit", RiskLevel::Critical, now),
        make_event("low", RiskLevel::Low, now),
    ];
    let outcome = manager.process(&events).await;

    assert_eq!(outcome.stored, 2);
    assert_eq!(outcome.emails_sent, 1);
    assert_eq!(outcome.critical_count, 1);
    assert_eq!(outcome.high_count, 0);
    assert!(outcome.errors.is_empty());

    // One notifier call, with the whole batch
    assert_eq!(notifier.critical_calls(), vec![2]);

    // Only the critical event carries the notification flag
    let crit = manager.by_level(RiskLevel::Critical, false);
    assert!(crit[0].email_sent);
    let low = manager.by_level(RiskLevel::Low, false);
    assert!(!low[0].email_sent);
}

#[tokio::test]
async fn process_skips_notifier_without_high_severity() {
    let notifier = Arc::new(RecordingNotifier::new());
    let (_dir, manager) = setup(notifier.clone());
    let now = Utc::now();

    let events = vec![
        make_event("low", RiskLevel::Low, now),
        make_event("med", RiskLevel::Medium, now),
    ];
    let outcome = manager.process(&events).await;

    assert_eq!(outcome.stored, 2);
    assert_eq!(outcome.emails_sent, 0);
    assert!(notifier.critical_calls().is_empty());
}

#[tokio::test]
async fn process_surfaces_notifier_failure_without_losing_storage() {
    let notifier = Arc::new(RecordingNotifier::failing());
    let (_dir, manager) = setup(notifier.clone());
    let now = Utc::now();

    let events = vec![make_event("crit", RiskLevel::Critical, now)];
    let outcome = manager.process(&events).await;

    assert_eq!(outcome.stored, 1);
    assert_eq!(outcome.emails_sent, 0);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains("smtp timeout"));

    // Escalation state stays unset after a failed delivery
    let crit = manager.by_level(RiskLevel::Critical, false);
    assert!(!crit[0].email_sent);
    assert!(crit[0].email_sent_at.is_none());
}

#[tokio::test]
async fn process_is_idempotent_across_repeated_scans() {
    let notifier = Arc::new(RecordingNotifier::new());
    let (_dir, manager) = setup(notifier);
    let now = Utc::now();

    let events = vec![make_event("crit", RiskLevel::Critical, now)];
    let first = manager.process(&events).await;
    let second = manager.process(&events).await;

    assert_eq!(first.stored, 1);
    assert_eq!(second.stored, 0);
    assert_eq!(manager.unresolved(10).len(), 1);
}

#[tokio::test]
async fn resolve_maps_store_outcomes() {
    let notifier = Arc::new(RecordingNotifier::new());
    let (_dir, manager) = setup(notifier);

    manager
        .process(&[make_event("evt", RiskLevel::Low, Utc::now())])
        .await;

    assert_eq!(manager.resolve("evt", "operator"), ResolveOutcome::Resolved);
    assert_eq!(
        manager.resolve("evt", "operator"),
        ResolveOutcome::AlreadyResolved
    );
    assert_eq!(manager.resolve("ghost", "operator"), ResolveOutcome::NotFound);
}

#[tokio::test]
async fn statistics_balance_over_the_window() {
    let notifier = Arc::new(RecordingNotifier::new());
    let (_dir, manager) = setup(notifier);
    let now = Utc::now();

    manager
        .process(&[
            make_event("crit", RiskLevel::Critical, now),
            make_event("high", RiskLevel::High, now - Duration::hours(1)),
            make_event("old", RiskLevel::Low, now - Duration::hours(48)),
        ])
        .await;
    manager.resolve("high", "operator");

    let stats = manager.statistics(24);
    assert_eq!(stats.period_hours, 24);
    assert_eq!(stats.total, 2);
    assert_eq!(stats.unresolved, 1);
    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.total, stats.resolved + stats.unresolved);
    assert_eq!(stats.critical_count, 1);
    // The resolved high event left the unresolved breakdown
    assert_eq!(stats.high_count, 0);
    assert_eq!(stats.by_type.get("security"), Some(&1));
}

#[tokio::test]
async fn daily_report_forwards_window_and_reports_failure() {
    let notifier = Arc::new(RecordingNotifier::new());
    let (_dir, manager) = setup(notifier.clone());
    let now = Utc::now();

    manager
        .process(&[
            make_event("recent", RiskLevel::Low, now),
            make_event("old", RiskLevel::Low, now - Duration::hours(30)),
        ])
        .await;

    assert!(manager.send_daily_report().await);
    // Only the trailing 24 hours are forwarded
    assert_eq!(notifier.daily_calls(), vec![1]);

    let failing = Arc::new(RecordingNotifier::failing());
    let (_dir2, manager) = setup(failing);
    assert!(!manager.send_daily_report().await);
}

#[tokio::test]
async fn cleanup_reports_deleted_count() {
    let notifier = Arc::new(RecordingNotifier::new());
    let (_dir, manager) = setup(notifier);
    let now = Utc::now();

    manager
        .process(&[
            make_event("open", RiskLevel::Low, now - Duration::days(90)),
            make_event("done", RiskLevel::Low, now - Duration::days(90)),
        ])
        .await;
    manager.resolve("done", "operator");

    // resolved_at is "now", so a 30-day retention keeps everything
    assert_eq!(manager.cleanup(30), 0);
    // Retention of -1 day puts the cutoff ahead of the resolve timestamp
    assert_eq!(manager.cleanup(-1), 1);
    assert_eq!(manager.unresolved(10).len(), 1);
}

/// Store stub whose every operation fails, to exercise the safe defaults.
struct BrokenStore;

impl RiskEventStore for BrokenStore {
    fn insert(&self, _: &RiskEvent) -> Result<bool> {
        anyhow::bail!("store offline")
    }
    fn get(&self, _: &str) -> Result<Option<RiskEventRecord>> {
        anyhow::bail!("store offline")
    }
    fn unresolved(&self, _: usize) -> Result<Vec<RiskEventRecord>> {
        anyhow::bail!("store offline")
    }
    fn by_level(&self, _: RiskLevel, _: bool) -> Result<Vec<RiskEventRecord>> {
        anyhow::bail!("store offline")
    }
    fn resolve(&self, _: &str, _: &str) -> Result<ResolveStatus> {
        anyhow::bail!("store offline")
    }
    fn mark_email_sent(&self, _: &[String]) -> Result<usize> {
        anyhow::bail!("store offline")
    }
    fn window_counts(&self, _: DateTime<Utc>) -> Result<WindowCounts> {
        anyhow::bail!("store offline")
    }
    fn events_since(&self, _: DateTime<Utc>) -> Result<Vec<RiskEventRecord>> {
        anyhow::bail!("store offline")
    }
    fn delete_resolved_before(&self, _: DateTime<Utc>) -> Result<u64> {
        anyhow::bail!("store offline")
    }
}

#[tokio::test]
async fn storage_failures_surface_as_safe_defaults() {
    let notifier = Arc::new(RecordingNotifier::new());
    let manager = AlertManager::new(Arc::new(BrokenStore), notifier.clone());
    let now = Utc::now();

    let events = vec![make_event("crit", RiskLevel::Critical, now)];
    let outcome = manager.process(&events).await;
    // Nothing stored, but the escalation path still runs and the flag
    // update failure is surfaced
    assert_eq!(outcome.stored, 0);
    assert_eq!(outcome.emails_sent, 1);
    assert_eq!(outcome.errors.len(), 1);

    assert!(manager.unresolved(10).is_empty());
    assert!(manager.by_level(RiskLevel::High, true).is_empty());
    assert_eq!(manager.resolve("x", "op"), ResolveOutcome::StorageError);
    assert_eq!(manager.cleanup(30), 0);
    assert!(!manager.send_daily_report().await);

    let stats = manager.statistics(24);
    assert_eq!(stats.total, 0);
    assert_eq!(stats.period_hours, 24);
}
