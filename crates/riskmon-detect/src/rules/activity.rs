use crate::RiskRule;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use riskmon_common::id::event_key;
use riskmon_common::types::{AccountSnapshot, RiskEvent, RiskLevel, RiskMetadata, RiskType};

/// Flags an unusually high share of accounts active in the trailing window.
///
/// Skipped entirely for small populations, where the ratio is noise.
pub struct UnusualActivityRule {
    /// Active-account ratio above which the event fires.
    pub active_ratio_threshold: f64,
    /// Minimum population size before the rule is evaluated at all.
    pub min_accounts: usize,
    pub activity_window_hours: i64,
    pub dedup_secs: i64,
}

impl Default for UnusualActivityRule {
    fn default() -> Self {
        Self {
            active_ratio_threshold: 0.80,
            min_accounts: 10,
            activity_window_hours: 24,
            dedup_secs: super::DEFAULT_DEDUP_SECS,
        }
    }
}

impl RiskRule for UnusualActivityRule {
    fn id(&self) -> &str {
        "unusual_activity"
    }

    fn name(&self) -> &str {
        "Unusual activity pattern"
    }

    fn evaluate(&self, snapshot: &AccountSnapshot, now: DateTime<Utc>) -> Result<Vec<RiskEvent>> {
        let total = snapshot.accounts.len();
        if total <= self.min_accounts {
            return Ok(Vec::new());
        }

        let cutoff = now - Duration::hours(self.activity_window_hours);
        let active = snapshot
            .accounts
            .iter()
            .filter(|account| account.last_active_at.is_some_and(|at| at > cutoff))
            .count();

        let active_ratio = active as f64 / total as f64;
        if active_ratio <= self.active_ratio_threshold {
            return Ok(Vec::new());
        }

        Ok(vec![RiskEvent {
            id: event_key(self.id(), "activity", self.dedup_secs, now),
            risk_type: RiskType::Security,
            level: RiskLevel::Medium,
            title: "Unusual Account Activity Pattern".to_string(),
            description: format!(
                "{:.0}% of accounts active in the last {} hours",
                active_ratio * 100.0,
                self.activity_window_hours
            ),
            value: (active_ratio * 100.0).round(),
            threshold: self.active_ratio_threshold * 100.0,
            timestamp: now,
            resolved: false,
            actions: vec![
                "Check for potential bot activity".to_string(),
                "Review new account registrations".to_string(),
                "Analyze login IP patterns".to_string(),
            ],
            metadata: Some(RiskMetadata::UnusualActivity {
                total_accounts: total,
                active_accounts: active,
                active_ratio,
            }),
        }])
    }
}
