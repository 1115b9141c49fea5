use crate::RiskRule;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use riskmon_common::id::event_key;
use riskmon_common::types::{AccountSnapshot, RiskEvent, RiskLevel, RiskMetadata, RiskType};
use std::collections::BTreeSet;

/// Flags a surge of new registrations inside the trailing window.
pub struct RegistrationSurgeRule {
    /// Registration count above which the event fires.
    pub surge_threshold: usize,
    pub window_hours: i64,
    pub dedup_secs: i64,
}

impl Default for RegistrationSurgeRule {
    fn default() -> Self {
        Self {
            surge_threshold: 10,
            window_hours: 1,
            dedup_secs: super::DEFAULT_DEDUP_SECS,
        }
    }
}

impl RiskRule for RegistrationSurgeRule {
    fn id(&self) -> &str {
        "registration_surge"
    }

    fn name(&self) -> &str {
        "Registration surge"
    }

    fn evaluate(&self, snapshot: &AccountSnapshot, now: DateTime<Utc>) -> Result<Vec<RiskEvent>> {
        let cutoff = now - Duration::hours(self.window_hours);
        let cohort: Vec<_> = snapshot
            .accounts
            .iter()
            .filter(|account| account.created_at > cutoff)
            .collect();

        if cohort.len() <= self.surge_threshold {
            return Ok(Vec::new());
        }

        // Distinct origin IPs of the surge cohort, ordered for stable output
        let registration_ips: BTreeSet<String> = cohort
            .iter()
            .filter_map(|account| account.registration_ip.clone())
            .collect();

        Ok(vec![RiskEvent {
            id: event_key(self.id(), "registrations", self.dedup_secs, now),
            risk_type: RiskType::Security,
            level: RiskLevel::High,
            title: "Unusual Registration Spike".to_string(),
            description: format!(
                "{} new accounts registered in the last hour",
                cohort.len()
            ),
            value: cohort.len() as f64,
            threshold: self.surge_threshold as f64,
            timestamp: now,
            resolved: false,
            actions: vec![
                "Review new registrations for authenticity".to_string(),
                "Check for potential bot registration patterns".to_string(),
                "Consider implementing CAPTCHA or rate limiting".to_string(),
            ],
            metadata: Some(RiskMetadata::RegistrationSurge {
                recent_registrations: cohort.len(),
                registration_ips: registration_ips.into_iter().collect(),
            }),
        }])
    }
}
