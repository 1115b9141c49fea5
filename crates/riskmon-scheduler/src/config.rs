use serde::{Deserialize, Serialize};

/// Monitoring harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Master switch; when off no tasks are registered.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub daily_report: DailyReportConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            scan: ScanConfig::default(),
            cleanup: CleanupConfig::default(),
            daily_report: DailyReportConfig::default(),
        }
    }
}

impl MonitorConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_scan_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_soft_time_limit_secs")]
    pub soft_time_limit_secs: u64,
    #[serde(default = "default_hard_time_limit_secs")]
    pub hard_time_limit_secs: u64,
    #[serde(default = "default_scan_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_scan_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_scan_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_scan_interval_secs(),
            soft_time_limit_secs: default_soft_time_limit_secs(),
            hard_time_limit_secs: default_hard_time_limit_secs(),
            max_retries: default_scan_max_retries(),
            backoff_base_secs: default_scan_backoff_base_secs(),
            backoff_cap_secs: default_scan_backoff_cap_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_cleanup_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_soft_time_limit_secs")]
    pub soft_time_limit_secs: u64,
    #[serde(default = "default_hard_time_limit_secs")]
    pub hard_time_limit_secs: u64,
    #[serde(default = "default_cleanup_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_cleanup_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_cleanup_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval_secs(),
            retention_days: default_retention_days(),
            soft_time_limit_secs: default_soft_time_limit_secs(),
            hard_time_limit_secs: default_hard_time_limit_secs(),
            max_retries: default_cleanup_max_retries(),
            backoff_base_secs: default_cleanup_backoff_base_secs(),
            backoff_cap_secs: default_cleanup_backoff_cap_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReportConfig {
    /// Off by default; the report stays reachable on demand.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_daily_report_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_soft_time_limit_secs")]
    pub soft_time_limit_secs: u64,
    #[serde(default = "default_hard_time_limit_secs")]
    pub hard_time_limit_secs: u64,
    #[serde(default = "default_scan_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_daily_report_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_cleanup_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
}

impl Default for DailyReportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_daily_report_interval_secs(),
            soft_time_limit_secs: default_soft_time_limit_secs(),
            hard_time_limit_secs: default_hard_time_limit_secs(),
            max_retries: default_scan_max_retries(),
            backoff_base_secs: default_daily_report_backoff_base_secs(),
            backoff_cap_secs: default_cleanup_backoff_cap_secs(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_scan_interval_secs() -> u64 {
    300
}

fn default_soft_time_limit_secs() -> u64 {
    25 * 60
}

fn default_hard_time_limit_secs() -> u64 {
    30 * 60
}

fn default_scan_max_retries() -> u32 {
    3
}

fn default_scan_backoff_base_secs() -> u64 {
    60
}

fn default_scan_backoff_cap_secs() -> u64 {
    900
}

fn default_cleanup_interval_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_retention_days() -> i64 {
    30
}

fn default_cleanup_max_retries() -> u32 {
    2
}

fn default_cleanup_backoff_base_secs() -> u64 {
    600
}

fn default_cleanup_backoff_cap_secs() -> u64 {
    3600
}

fn default_daily_report_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_daily_report_backoff_base_secs() -> u64 {
    300
}
