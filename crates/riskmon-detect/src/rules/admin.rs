use crate::RiskRule;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use riskmon_common::id::event_key;
use riskmon_common::types::{
    AccountSnapshot, AdminActivity, RiskEvent, RiskLevel, RiskMetadata, RiskType,
};

/// Watches administrator account health.
///
/// An empty admin set is a critical condition on its own and short-circuits
/// the inactivity check. Otherwise admins with no recorded activity, or
/// activity older than `inactivity_days`, count as inactive.
pub struct AdminSecurityRule {
    pub inactivity_days: i64,
    pub dedup_secs: i64,
}

impl Default for AdminSecurityRule {
    fn default() -> Self {
        Self {
            inactivity_days: 7,
            dedup_secs: super::DEFAULT_DEDUP_SECS,
        }
    }
}

impl RiskRule for AdminSecurityRule {
    fn id(&self) -> &str {
        "admin_security"
    }

    fn name(&self) -> &str {
        "Administrator account security"
    }

    fn evaluate(&self, snapshot: &AccountSnapshot, now: DateTime<Utc>) -> Result<Vec<RiskEvent>> {
        // An empty snapshot yields no events; only a populated dataset with
        // zero admins is an actionable condition.
        if snapshot.accounts.is_empty() {
            return Ok(Vec::new());
        }

        let admins: Vec<_> = snapshot
            .accounts
            .iter()
            .filter(|account| account.is_admin())
            .collect();

        if admins.is_empty() {
            return Ok(vec![RiskEvent {
                id: event_key(self.id(), "no_admins", self.dedup_secs, now),
                risk_type: RiskType::Security,
                level: RiskLevel::Critical,
                title: "No Administrator Accounts".to_string(),
                description: "System has no administrator accounts configured".to_string(),
                value: 0.0,
                threshold: 1.0,
                timestamp: now,
                resolved: false,
                actions: vec![
                    "Create administrator account immediately".to_string(),
                    "Review account permissions configuration".to_string(),
                ],
                metadata: None,
            }]);
        }

        let cutoff = now - Duration::days(self.inactivity_days);
        let inactive: Vec<AdminActivity> = admins
            .iter()
            .filter(|admin| !admin.last_active_at.is_some_and(|at| at >= cutoff))
            .map(|admin| AdminActivity {
                account_id: admin.id.clone(),
                last_active_at: admin.last_active_at,
            })
            .collect();

        if inactive.is_empty() {
            return Ok(Vec::new());
        }

        let level = if inactive.len() == admins.len() {
            RiskLevel::Critical
        } else {
            RiskLevel::High
        };

        Ok(vec![RiskEvent {
            id: event_key(self.id(), "inactivity", self.dedup_secs, now),
            risk_type: RiskType::Security,
            level,
            title: "Administrator Account Inactivity".to_string(),
            description: format!(
                "{}/{} admins inactive for {}+ days",
                inactive.len(),
                admins.len(),
                self.inactivity_days
            ),
            value: inactive.len() as f64,
            threshold: 1.0,
            timestamp: now,
            resolved: false,
            actions: vec![
                "Contact inactive administrators".to_string(),
                "Review admin access logs".to_string(),
                "Consider emergency admin access procedures".to_string(),
            ],
            metadata: Some(RiskMetadata::AdminInactivity {
                total_admins: admins.len(),
                inactive,
            }),
        }])
    }
}
