use crate::config::MonitorConfig;
use crate::task::{RetryPolicy, ScheduledTask, TaskRegistry, TaskSpec};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use riskmon_alert::AlertManager;
use riskmon_common::types::RiskLevel;
use riskmon_detect::detector::Detector;
use riskmon_detect::SnapshotSource;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const SCAN_TASK: &str = "risk-scan";
pub const CLEANUP_TASK: &str = "risk-cleanup";
pub const DAILY_REPORT_TASK: &str = "daily-report";

/// One full scan as a unit of work: detect, then process the batch.
pub struct ScanJob {
    detector: Detector,
    source: Arc<dyn SnapshotSource>,
    alerts: Arc<AlertManager>,
}

impl ScanJob {
    pub fn new(
        detector: Detector,
        source: Arc<dyn SnapshotSource>,
        alerts: Arc<AlertManager>,
    ) -> Self {
        Self {
            detector,
            source,
            alerts,
        }
    }
}

#[async_trait]
impl ScheduledTask for ScanJob {
    fn name(&self) -> &str {
        SCAN_TASK
    }

    async fn run(&self) -> Result<Value> {
        let started = Utc::now();
        let events = self.detector.scan(self.source.as_ref()).await;
        let outcome = self.alerts.process(&events).await;

        let count_level =
            |level: RiskLevel| events.iter().filter(|e| e.level == level).count();
        let duration_ms = (Utc::now() - started).num_milliseconds();

        tracing::info!(
            detected = events.len(),
            stored = outcome.stored,
            emails_sent = outcome.emails_sent,
            duration_ms,
            "Risk scan completed"
        );

        Ok(json!({
            "detected": events.len(),
            "stored": outcome.stored,
            "emails_sent": outcome.emails_sent,
            "risk_counts": {
                "critical": count_level(RiskLevel::Critical),
                "high": count_level(RiskLevel::High),
                "medium": count_level(RiskLevel::Medium),
                "low": count_level(RiskLevel::Low),
            },
            "errors": outcome.errors,
            "duration_ms": duration_ms,
        }))
    }
}

/// Purges resolved events past the retention cutoff.
pub struct CleanupJob {
    alerts: Arc<AlertManager>,
    retention_days: i64,
}

impl CleanupJob {
    pub fn new(alerts: Arc<AlertManager>, retention_days: i64) -> Self {
        Self {
            alerts,
            retention_days,
        }
    }
}

#[async_trait]
impl ScheduledTask for CleanupJob {
    fn name(&self) -> &str {
        CLEANUP_TASK
    }

    async fn run(&self) -> Result<Value> {
        let deleted = self.alerts.cleanup(self.retention_days);
        tracing::info!(deleted, retention_days = self.retention_days, "Risk cleanup completed");
        Ok(json!({
            "deleted": deleted,
            "retention_days": self.retention_days,
        }))
    }
}

/// Forwards the trailing-24h window to the notifier's daily report.
pub struct DailyReportJob {
    alerts: Arc<AlertManager>,
}

impl DailyReportJob {
    pub fn new(alerts: Arc<AlertManager>) -> Self {
        Self { alerts }
    }
}

#[async_trait]
impl ScheduledTask for DailyReportJob {
    fn name(&self) -> &str {
        DAILY_REPORT_TASK
    }

    async fn run(&self) -> Result<Value> {
        if self.alerts.send_daily_report().await {
            Ok(json!({ "email_sent": true }))
        } else {
            anyhow::bail!("daily report delivery failed")
        }
    }
}

/// Wires the standard task set from configuration.
pub fn build_registry(
    config: &MonitorConfig,
    detector: Detector,
    source: Arc<dyn SnapshotSource>,
    alerts: Arc<AlertManager>,
) -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    if !config.enabled {
        tracing::info!("Risk monitoring is disabled, no tasks registered");
        return registry;
    }

    registry.register(TaskSpec {
        task: Arc::new(ScanJob::new(detector, source, alerts.clone())),
        interval: Duration::from_secs(config.scan.interval_secs),
        retry: RetryPolicy {
            max_retries: config.scan.max_retries,
            backoff_base_secs: config.scan.backoff_base_secs,
            backoff_cap_secs: config.scan.backoff_cap_secs,
        },
        soft_limit: Duration::from_secs(config.scan.soft_time_limit_secs),
        hard_limit: Duration::from_secs(config.scan.hard_time_limit_secs),
    });

    registry.register(TaskSpec {
        task: Arc::new(CleanupJob::new(alerts.clone(), config.cleanup.retention_days)),
        interval: Duration::from_secs(config.cleanup.interval_secs),
        retry: RetryPolicy {
            max_retries: config.cleanup.max_retries,
            backoff_base_secs: config.cleanup.backoff_base_secs,
            backoff_cap_secs: config.cleanup.backoff_cap_secs,
        },
        soft_limit: Duration::from_secs(config.cleanup.soft_time_limit_secs),
        hard_limit: Duration::from_secs(config.cleanup.hard_time_limit_secs),
    });

    if config.daily_report.enabled {
        registry.register(TaskSpec {
            task: Arc::new(DailyReportJob::new(alerts)),
            interval: Duration::from_secs(config.daily_report.interval_secs),
            retry: RetryPolicy {
                max_retries: config.daily_report.max_retries,
                backoff_base_secs: config.daily_report.backoff_base_secs,
                backoff_cap_secs: config.daily_report.backoff_cap_secs,
            },
            soft_limit: Duration::from_secs(config.daily_report.soft_time_limit_secs),
            hard_limit: Duration::from_secs(config.daily_report.hard_time_limit_secs),
        });
    }

    registry
}
