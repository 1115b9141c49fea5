use crate::rules::{
    AdminSecurityRule, HighUsageRule, QuotaExhaustionRule, RegistrationSurgeRule,
    SharedRegistrationIpRule, UnusualActivityRule,
};
use crate::{RiskRule, SnapshotSource};
use chrono::{DateTime, Utc};
use riskmon_common::id::event_key;
use riskmon_common::types::{AccountSnapshot, RiskEvent, RiskLevel, RiskType};

/// Dedup bucket for the synthetic detection-failure event.
const FAILURE_DEDUP_SECS: i64 = 3600;

/// Runs the registered rule battery against account snapshots.
///
/// Evaluation is read-only and side-effect-free; the detector owns no
/// persistence and is safe to run concurrently with itself.
pub struct Detector {
    rules: Vec<Box<dyn RiskRule>>,
}

impl Detector {
    pub fn new(rules: Vec<Box<dyn RiskRule>>) -> Self {
        Self { rules }
    }

    /// Builds the full battery with the default thresholds.
    pub fn with_default_rules() -> Self {
        Self::new(vec![
            Box::new(QuotaExhaustionRule::default()),
            Box::new(UnusualActivityRule::default()),
            Box::new(AdminSecurityRule::default()),
            Box::new(HighUsageRule::default()),
            Box::new(RegistrationSurgeRule::default()),
            Box::new(SharedRegistrationIpRule::default()),
        ])
    }

    pub fn rules(&self) -> &[Box<dyn RiskRule>] {
        &self.rules
    }

    /// Evaluates every rule against the snapshot.
    ///
    /// A failing rule is logged and contributes no events; the remaining
    /// rules still run. Never fails.
    pub fn detect_all(&self, snapshot: &AccountSnapshot, now: DateTime<Utc>) -> Vec<RiskEvent> {
        let mut events = Vec::new();

        for rule in &self.rules {
            match rule.evaluate(snapshot, now) {
                Ok(found) => events.extend(found),
                Err(e) => {
                    tracing::error!(rule = rule.id(), error = %e, "Risk rule evaluation failed");
                }
            }
        }

        tracing::info!(count = events.len(), "Risk detection completed");
        events
    }

    /// Loads a snapshot from the source and evaluates the battery.
    ///
    /// A snapshot load failure yields exactly one synthetic `system`/`high`
    /// event describing the failure, so a scan never silently returns
    /// nothing.
    pub async fn scan(&self, source: &dyn SnapshotSource) -> Vec<RiskEvent> {
        let now = Utc::now();
        match source.load().await {
            Ok(snapshot) => self.detect_all(&snapshot, now),
            Err(e) => {
                tracing::error!(error = %e, "Account snapshot unavailable, detection aborted");
                vec![detection_failure_event(&e.to_string(), now)]
            }
        }
    }
}

fn detection_failure_event(error: &str, now: DateTime<Utc>) -> RiskEvent {
    RiskEvent {
        id: event_key("detection_failure", "system", FAILURE_DEDUP_SECS, now),
        risk_type: RiskType::System,
        level: RiskLevel::High,
        title: "Risk Detection System Failure".to_string(),
        description: format!("Risk detection encountered an error: {error}"),
        value: 1.0,
        threshold: 0.0,
        timestamp: now,
        resolved: false,
        actions: vec![
            "Check system logs".to_string(),
            "Restart monitoring service".to_string(),
        ],
        metadata: None,
    }
}
