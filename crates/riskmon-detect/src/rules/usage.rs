use crate::RiskRule;
use anyhow::Result;
use chrono::{DateTime, Utc};
use riskmon_common::id::event_key;
use riskmon_common::types::{AccountSnapshot, RiskEvent, RiskLevel, RiskMetadata, RiskType};

/// Flags high aggregate resource usage across the account population.
pub struct HighUsageRule {
    /// Average per-account usage above which the event fires.
    pub average_threshold: f64,
    pub dedup_secs: i64,
}

impl Default for HighUsageRule {
    fn default() -> Self {
        Self {
            average_threshold: 50_000.0,
            dedup_secs: super::DEFAULT_DEDUP_SECS,
        }
    }
}

impl RiskRule for HighUsageRule {
    fn id(&self) -> &str {
        "high_usage"
    }

    fn name(&self) -> &str {
        "High aggregate usage"
    }

    fn evaluate(&self, snapshot: &AccountSnapshot, now: DateTime<Utc>) -> Result<Vec<RiskEvent>> {
        if snapshot.accounts.is_empty() {
            return Ok(Vec::new());
        }

        let total_used: u64 = snapshot.accounts.iter().map(|account| account.used).sum();
        let average_used = total_used as f64 / snapshot.accounts.len() as f64;

        if average_used <= self.average_threshold {
            return Ok(Vec::new());
        }

        Ok(vec![RiskEvent {
            id: event_key(self.id(), "usage", self.dedup_secs, now),
            risk_type: RiskType::Performance,
            level: RiskLevel::Medium,
            title: "High System Resource Usage".to_string(),
            description: format!("Average usage per account: {:.0}", average_used.round()),
            value: average_used.round(),
            threshold: self.average_threshold,
            timestamp: now,
            resolved: false,
            actions: vec![
                "Optimize resource usage efficiency".to_string(),
                "Consider implementing rate limiting".to_string(),
                "Review resource allocation policies".to_string(),
            ],
            metadata: Some(RiskMetadata::HighUsage {
                total_used,
                account_count: snapshot.accounts.len(),
                average_used,
            }),
        }])
    }
}
