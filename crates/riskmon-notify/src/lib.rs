//! Notification seam for escalated risk events.
//!
//! Rendering and transport (templating, delivery providers) live outside
//! the core; this crate defines the [`Notifier`] contract the alert manager
//! dispatches through, and a delivery-free [`LogNotifier`] stand-in.

pub mod error;


use async_trait::async_trait;
use error::Result;
use riskmon_common::types::{RiskEvent, RiskLevel};

/// A notification sink for escalated alerts and periodic reports.
///
/// Both operations are fallible, side-effecting calls whose failure is
/// recoverable: the alert manager logs it and surfaces it in the scan
/// outcome, never aborting the scan.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a critical-alert notification for the batch.
    ///
    /// The batch is the full scan output; the channel decides how to
    /// present the high-severity members.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails; persisted events are unaffected.
    async fn send_critical_alert(&self, events: &[RiskEvent]) -> Result<()>;

    /// Delivers the daily summary built from the trailing 24-hour window.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails.
    async fn send_daily_report(&self, events: &[RiskEvent]) -> Result<()>;

    /// Returns the channel type name (e.g., `"email"`, `"log"`).
    fn channel_name(&self) -> &str;
}

/// Delivery-free notifier that records batches in the log stream.
///
/// Default wiring for environments without a configured provider.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_critical_alert(&self, events: &[RiskEvent]) -> Result<()> {
        let escalated = events
            .iter()
            .filter(|event| event.level >= RiskLevel::High)
            .count();
        tracing::warn!(
            batch = events.len(),
            escalated,
            "Critical alert batch (log channel)"
        );
        Ok(())
    }

    async fn send_daily_report(&self, events: &[RiskEvent]) -> Result<()> {
        tracing::info!(count = events.len(), "Daily risk report (log channel)");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
