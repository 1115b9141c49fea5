use crate::RiskRule;
use anyhow::Result;
use chrono::{DateTime, Utc};
use riskmon_common::id::event_key;
use riskmon_common::types::{AccountSnapshot, QuotaUsage, RiskEvent, RiskLevel, RiskMetadata, RiskType};

/// Flags accounts whose quota usage ratio exceeds the threshold.
///
/// One aggregate event per scan; `Critical` when more than
/// `critical_count` accounts are affected, `High` otherwise.
pub struct QuotaExhaustionRule {
    /// Usage ratio above which an account counts as near exhaustion.
    pub ratio_threshold: f64,
    /// Affected-account count above which the event escalates to critical.
    pub critical_count: usize,
    pub dedup_secs: i64,
}

impl Default for QuotaExhaustionRule {
    fn default() -> Self {
        Self {
            ratio_threshold: 0.90,
            critical_count: 3,
            dedup_secs: super::DEFAULT_DEDUP_SECS,
        }
    }
}

impl RiskRule for QuotaExhaustionRule {
    fn id(&self) -> &str {
        "quota_exhaustion"
    }

    fn name(&self) -> &str {
        "Quota exhaustion"
    }

    fn evaluate(&self, snapshot: &AccountSnapshot, now: DateTime<Utc>) -> Result<Vec<RiskEvent>> {
        // Accounts without an assigned quota cannot form a ratio and are skipped.
        let affected: Vec<QuotaUsage> = snapshot
            .accounts
            .iter()
            .filter_map(|account| account.usage_ratio().map(|ratio| (account, ratio)))
            .filter(|(_, ratio)| *ratio > self.ratio_threshold)
            .map(|(account, ratio)| QuotaUsage {
                account_id: account.id.clone(),
                used_percent: (ratio * 1000.0).round() / 10.0,
            })
            .collect();

        if affected.is_empty() {
            return Ok(Vec::new());
        }

        let level = if affected.len() > self.critical_count {
            RiskLevel::Critical
        } else {
            RiskLevel::High
        };

        Ok(vec![RiskEvent {
            id: event_key(self.id(), "accounts", self.dedup_secs, now),
            risk_type: RiskType::Usage,
            level,
            title: "Account Quota Near Exhaustion".to_string(),
            description: format!(
                "{} accounts have quota usage over {:.0}%",
                affected.len(),
                self.ratio_threshold * 100.0
            ),
            value: affected.len() as f64,
            threshold: self.critical_count as f64,
            timestamp: now,
            resolved: false,
            actions: vec![
                "Contact administrators to increase quotas".to_string(),
                "Review account usage patterns".to_string(),
                "Consider implementing automatic quota management".to_string(),
            ],
            metadata: Some(RiskMetadata::QuotaExhaustion { affected }),
        }])
    }
}
