pub mod activity;
pub mod admin;
pub mod quota;
pub mod registration;
pub mod shared_ip;
pub mod usage;

pub use activity::UnusualActivityRule;
pub use admin::AdminSecurityRule;
pub use quota::QuotaExhaustionRule;
pub use registration::RegistrationSurgeRule;
pub use shared_ip::SharedRegistrationIpRule;
pub use usage::HighUsageRule;

/// Default dedup bucket: a persisting condition re-alerts once per hour.
pub(crate) const DEFAULT_DEDUP_SECS: i64 = 3600;
