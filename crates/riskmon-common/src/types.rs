use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use riskmon_common::types::RiskLevel;
///
/// let level: RiskLevel = "high".parse().unwrap();
/// assert_eq!(level, RiskLevel::High);
/// assert_eq!(level.to_string(), "high");
/// assert!(RiskLevel::Critical > RiskLevel::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            _ => Err(format!("unknown risk level: {s}")),
        }
    }
}

/// Risk category a rule reports under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskType {
    Security,
    Performance,
    Usage,
    System,
}

impl RiskType {
    pub const ALL: [RiskType; 4] = [
        RiskType::Security,
        RiskType::Performance,
        RiskType::Usage,
        RiskType::System,
    ];
}

impl std::fmt::Display for RiskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskType::Security => write!(f, "security"),
            RiskType::Performance => write!(f, "performance"),
            RiskType::Usage => write!(f, "usage"),
            RiskType::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for RiskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "security" => Ok(RiskType::Security),
            "performance" => Ok(RiskType::Performance),
            "usage" => Ok(RiskType::Usage),
            "system" => Ok(RiskType::System),
            _ => Err(format!("unknown risk type: {s}")),
        }
    }
}

/// Per-account quota usage carried in quota-exhaustion metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub account_id: String,
    /// Percentage of quota consumed, rounded to one decimal.
    pub used_percent: f64,
}

/// Inactive administrator entry carried in admin-inactivity metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminActivity {
    pub account_id: String,
    pub last_active_at: Option<DateTime<Utc>>,
}

/// Rule-specific structured payload attached to a [`RiskEvent`].
///
/// One variant per detection rule so that consumers can match on the
/// payload instead of probing an untyped map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskMetadata {
    QuotaExhaustion {
        affected: Vec<QuotaUsage>,
    },
    UnusualActivity {
        total_accounts: usize,
        active_accounts: usize,
        active_ratio: f64,
    },
    AdminInactivity {
        total_admins: usize,
        inactive: Vec<AdminActivity>,
    },
    HighUsage {
        total_used: u64,
        account_count: usize,
        average_used: f64,
    },
    RegistrationSurge {
        recent_registrations: usize,
        registration_ips: Vec<String>,
    },
    SharedRegistrationIp {
        ip: String,
        registration_count: usize,
        account_ids: Vec<String>,
    },
}

/// A detected risk condition, the unit of detection output.
///
/// The `id` is a content-derived fingerprint (see [`crate::id::event_key`]):
/// repeated detections of the same condition within the same dedup bucket
/// carry the same id, so the store can suppress duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub risk_type: RiskType,
    pub level: RiskLevel,
    pub title: String,
    pub description: String,
    /// The measured quantity that triggered the event (rule-specific units).
    pub value: f64,
    /// The limit the measurement was compared against.
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
    /// Recommended remediation steps, static per rule.
    pub actions: Vec<String>,
    pub metadata: Option<RiskMetadata>,
}

/// One account row from the external data-access snapshot.
///
/// The core never writes to the source of these records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: String,
    pub quota: u64,
    pub used: u64,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub registration_ip: Option<String>,
}

impl AccountRecord {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    /// Fraction of quota consumed, or `None` when no quota is assigned.
    pub fn usage_ratio(&self) -> Option<f64> {
        if self.quota == 0 {
            None
        } else {
            Some(self.used as f64 / self.quota as f64)
        }
    }
}

/// Point-in-time view of the account dataset a scan evaluates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub taken_at: DateTime<Utc>,
    pub accounts: Vec<AccountRecord>,
}

impl AccountSnapshot {
    pub fn new(taken_at: DateTime<Utc>, accounts: Vec<AccountRecord>) -> Self {
        Self { taken_at, accounts }
    }
}
