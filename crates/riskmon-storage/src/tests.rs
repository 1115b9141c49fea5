use crate::sqlite::SqliteRiskStore;
use crate::{ResolveStatus, RiskEventStore};
use chrono::{DateTime, Duration, Utc};
use riskmon_common::types::{RiskEvent, RiskLevel, RiskMetadata, RiskType};
use tempfile::TempDir;

fn setup() -> (TempDir, SqliteRiskStore) {
    let dir = TempDir::new().unwrap();
    let store = SqliteRiskStore::open(&dir.path().join("risk.db")).unwrap();
    (dir, store)
}

fn make_event(id: &str, level: RiskLevel, ts: DateTime<Utc>) -> RiskEvent {
    RiskEvent {
        id: id.to_string(),
        risk_type: RiskType::Security,
        level,
        title: format!("Event {id}"),
        description: "test event".to_string(),
        value: 5.0,
        threshold: 3.0,
        timestamp: ts,
        resolved: false,
        actions: vec!["Review accounts".to_string()],
        metadata: Some(RiskMetadata::SharedRegistrationIp {
            ip: "10.0.0.1".to_string(),
            registration_count: 5,
            account_ids: vec!["a".to_string(), "b".to_string()],
        }),
    }
}

#[test]
fn insert_is_idempotent_per_id() {
    let (_dir, store) = setup();
    let event = make_event("evt-1", RiskLevel::High, Utc::now());

    assert!(store.insert(&event).unwrap());

    // Second store of the same id writes nothing and mutates nothing
    let mut changed = event.clone();
    changed.title = "Different title".to_string();
    assert!(!store.insert(&changed).unwrap());

    let record = store.get("evt-1").unwrap().unwrap();
    assert_eq!(record.title, "Event evt-1");
}

#[test]
fn get_round_trips_actions_and_metadata() {
    let (_dir, store) = setup();
    let event = make_event("evt-1", RiskLevel::Medium, Utc::now());
    store.insert(&event).unwrap();

    let record = store.get("evt-1").unwrap().unwrap();
    assert_eq!(record.level, RiskLevel::Medium);
    assert_eq!(record.actions, vec!["Review accounts".to_string()]);
    assert_eq!(record.metadata, event.metadata);
    assert!(!record.email_sent);
    assert!(record.resolved_at.is_none());

    assert!(store.get("missing").unwrap().is_none());
}

#[test]
fn unresolved_is_newest_first_and_capped() {
    let (_dir, store) = setup();
    let now = Utc::now();
    for i in 0..5 {
        let event = make_event(
            &format!("evt-{i}"),
            RiskLevel::Low,
            now - Duration::minutes(i),
        );
        store.insert(&event).unwrap();
    }
    store.resolve("evt-4", "operator").unwrap();

    let records = store.unresolved(3).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].id, "evt-0");
    assert!(records[0].timestamp >= records[1].timestamp);
    assert!(records.iter().all(|r| !r.resolved));
}

#[test]
fn by_level_filters_severity_and_resolution() {
    let (_dir, store) = setup();
    let now = Utc::now();
    store.insert(&make_event("high-1", RiskLevel::High, now)).unwrap();
    store
        .insert(&make_event("high-2", RiskLevel::High, now - Duration::minutes(1)))
        .unwrap();
    store.insert(&make_event("low-1", RiskLevel::Low, now)).unwrap();
    store.resolve("high-2", "operator").unwrap();

    let unresolved_high = store.by_level(RiskLevel::High, true).unwrap();
    assert_eq!(unresolved_high.len(), 1);
    assert_eq!(unresolved_high[0].id, "high-1");

    let all_high = store.by_level(RiskLevel::High, false).unwrap();
    assert_eq!(all_high.len(), 2);
}

#[test]
fn resolve_transitions_exactly_once() {
    let (_dir, store) = setup();
    store
        .insert(&make_event("evt-1", RiskLevel::High, Utc::now()))
        .unwrap();

    assert_eq!(
        store.resolve("evt-1", "operator").unwrap(),
        ResolveStatus::Resolved
    );
    let record = store.get("evt-1").unwrap().unwrap();
    assert!(record.resolved);
    assert!(record.resolved_at.is_some());
    assert_eq!(record.resolved_by.as_deref(), Some("operator"));

    // Second resolve mutates nothing
    let first_resolved_at = record.resolved_at;
    assert_eq!(
        store.resolve("evt-1", "someone-else").unwrap(),
        ResolveStatus::AlreadyResolved
    );
    let record = store.get("evt-1").unwrap().unwrap();
    assert_eq!(record.resolved_at, first_resolved_at);
    assert_eq!(record.resolved_by.as_deref(), Some("operator"));
}

#[test]
fn resolve_unknown_id_is_not_found() {
    let (_dir, store) = setup();
    assert_eq!(
        store.resolve("ghost", "operator").unwrap(),
        ResolveStatus::NotFound
    );
}

#[test]
fn mark_email_sent_flags_only_given_ids() {
    let (_dir, store) = setup();
    let now = Utc::now();
    store.insert(&make_event("crit", RiskLevel::Critical, now)).unwrap();
    store.insert(&make_event("low", RiskLevel::Low, now)).unwrap();

    let updated = store.mark_email_sent(&["crit".to_string()]).unwrap();
    assert_eq!(updated, 1);

    let crit = store.get("crit").unwrap().unwrap();
    assert!(crit.email_sent);
    assert!(crit.email_sent_at.is_some());

    let low = store.get("low").unwrap().unwrap();
    assert!(!low.email_sent);
    assert!(low.email_sent_at.is_none());

    assert_eq!(store.mark_email_sent(&[]).unwrap(), 0);
}

#[test]
fn window_counts_balance_and_respect_the_window() {
    let (_dir, store) = setup();
    let now = Utc::now();

    store.insert(&make_event("in-1", RiskLevel::Critical, now)).unwrap();
    store
        .insert(&make_event("in-2", RiskLevel::High, now - Duration::hours(2)))
        .unwrap();
    store
        .insert(&make_event("old", RiskLevel::High, now - Duration::hours(48)))
        .unwrap();
    store.resolve("in-2", "operator").unwrap();

    let counts = store.window_counts(now - Duration::hours(24)).unwrap();
    assert_eq!(counts.total, 2);
    assert_eq!(counts.unresolved, 1);
    let resolved = counts.total - counts.unresolved;
    assert_eq!(resolved, 1);
    assert_eq!(counts.by_level.get("critical"), Some(&1));
    // Resolved events drop out of the per-level breakdown
    assert!(counts.by_level.get("high").is_none());
    assert_eq!(counts.by_type.get("security"), Some(&1));
}

#[test]
fn events_since_excludes_older_records() {
    let (_dir, store) = setup();
    let now = Utc::now();
    store.insert(&make_event("recent", RiskLevel::Low, now)).unwrap();
    store
        .insert(&make_event("old", RiskLevel::Low, now - Duration::hours(30)))
        .unwrap();

    let records = store.events_since(now - Duration::hours(24)).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "recent");
}

#[test]
fn cleanup_deletes_only_old_resolved_events() {
    let (_dir, store) = setup();
    let now = Utc::now();

    // Old unresolved event: never deleted regardless of age
    store
        .insert(&make_event("old-open", RiskLevel::High, now - Duration::days(90)))
        .unwrap();
    // Resolved just now: inside retention
    store
        .insert(&make_event("fresh-resolved", RiskLevel::Low, now - Duration::days(90)))
        .unwrap();
    store.resolve("fresh-resolved", "operator").unwrap();

    let deleted = store.delete_resolved_before(now - Duration::days(30)).unwrap();
    assert_eq!(deleted, 0);

    // A resolved_at in the past can only come from an earlier resolve, so
    // cut ahead of it instead of back-dating the row
    let deleted = store
        .delete_resolved_before(now + Duration::seconds(5))
        .unwrap();
    assert_eq!(deleted, 1);

    assert!(store.get("fresh-resolved").unwrap().is_none());
    assert!(store.get("old-open").unwrap().is_some());
}
