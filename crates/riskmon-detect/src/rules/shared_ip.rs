use crate::RiskRule;
use anyhow::Result;
use chrono::{DateTime, Utc};
use riskmon_common::id::event_key;
use riskmon_common::types::{AccountSnapshot, RiskEvent, RiskLevel, RiskMetadata, RiskType};
use std::collections::BTreeMap;

/// Flags registration IPs shared by several accounts.
///
/// Emits one event per offending IP, keyed on the IP itself so that the
/// same origin dedups across scans independently of the others.
pub struct SharedRegistrationIpRule {
    /// Registrations from a single IP at which the event fires (inclusive).
    pub registration_threshold: usize,
    pub dedup_secs: i64,
}

impl Default for SharedRegistrationIpRule {
    fn default() -> Self {
        Self {
            registration_threshold: 3,
            dedup_secs: super::DEFAULT_DEDUP_SECS,
        }
    }
}

impl RiskRule for SharedRegistrationIpRule {
    fn id(&self) -> &str {
        "shared_registration_ip"
    }

    fn name(&self) -> &str {
        "Shared-origin registration"
    }

    fn evaluate(&self, snapshot: &AccountSnapshot, now: DateTime<Utc>) -> Result<Vec<RiskEvent>> {
        // BTreeMap keeps per-IP events in a stable order across scans
        let mut by_ip: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for account in &snapshot.accounts {
            if let Some(ip) = account.registration_ip.as_deref() {
                by_ip.entry(ip).or_default().push(account.id.clone());
            }
        }

        let events = by_ip
            .into_iter()
            .filter(|(_, accounts)| accounts.len() >= self.registration_threshold)
            .map(|(ip, account_ids)| RiskEvent {
                id: event_key(self.id(), ip, self.dedup_secs, now),
                risk_type: RiskType::Security,
                level: RiskLevel::Medium,
                title: "Multiple Registrations from Same IP".to_string(),
                description: format!(
                    "{} accounts registered from IP: {ip}",
                    account_ids.len()
                ),
                value: account_ids.len() as f64,
                threshold: self.registration_threshold as f64,
                timestamp: now,
                resolved: false,
                actions: vec![
                    "Review accounts from this IP address".to_string(),
                    "Check for potential account farming".to_string(),
                    "Consider IP-based registration limits".to_string(),
                ],
                metadata: Some(RiskMetadata::SharedRegistrationIp {
                    ip: ip.to_string(),
                    registration_count: account_ids.len(),
                    account_ids,
                }),
            })
            .collect();

        Ok(events)
    }
}
