//! Risk detection engine: a fixed battery of stateless rules evaluated
//! against an account-data snapshot.
//!
//! Each [`RiskRule`] is independent; a failing rule is isolated by the
//! [`detector::Detector`] and contributes no events. Rules carry their own
//! thresholds and a dedup bucket so that repeated detections of the same
//! condition produce the same event id.

pub mod detector;
pub mod rules;


use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use riskmon_common::types::{AccountSnapshot, RiskEvent};

/// A detection rule evaluated over the full account snapshot.
///
/// Implementations are registered in the [`detector::Detector`] and run on
/// every scan. Rules are read-only with respect to the snapshot and emit
/// zero or more candidate events; most emit at most one aggregate event,
/// but per-subject rules (shared registration origin) may emit several.
pub trait RiskRule: Send + Sync {
    /// Stable identifier for this rule (e.g., `"quota_exhaustion"`); the
    /// first component of every event id the rule produces.
    fn id(&self) -> &str;

    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Evaluates the snapshot and returns the candidate events.
    ///
    /// # Errors
    ///
    /// Returns an error when the rule cannot complete; the detector logs
    /// it and proceeds with the remaining rules.
    fn evaluate(&self, snapshot: &AccountSnapshot, now: DateTime<Utc>) -> Result<Vec<RiskEvent>>;
}

/// Read-only provider of the account dataset, owned outside the core.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Loads a point-in-time snapshot of the account dataset.
    ///
    /// # Errors
    ///
    /// Returns an error when the dataset is unreachable; the detector
    /// converts it into a single synthetic detection-failure event.
    async fn load(&self) -> Result<AccountSnapshot>;
}
