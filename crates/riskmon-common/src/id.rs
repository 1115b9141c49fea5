use chrono::{DateTime, Utc};
use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

static ID_GENERATOR: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// Initialize the snowflake generator used for scheduler run ids.
///
/// `machine_id`: machine identifier (0-31)
/// `node_id`: node identifier (0-31)
pub fn init(machine_id: i32, node_id: i32) {
    let mut gen = ID_GENERATOR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *gen = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// Generate a snowflake id (string form).
pub fn next_id() -> String {
    let mut gen = ID_GENERATOR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let bucket = gen.get_or_insert_with(|| SnowflakeIdBucket::new(1, 1));
    bucket.get_id().to_string()
}

/// Content-derived identity for a risk event: `{rule}:{subject}:{bucket}`.
///
/// Repeated detections of the same condition produce the same key while the
/// timestamp stays inside the same `bucket_secs` window, which is what makes
/// insert-if-absent an effective dedup. The subject is the rule's business
/// key (a fixed tag for aggregate rules, the offending IP for per-IP rules).
pub fn event_key(rule: &str, subject: &str, bucket_secs: i64, ts: DateTime<Utc>) -> String {
    let bucket = ts.timestamp().div_euclid(bucket_secs.max(1));
    format!("{rule}:{subject}:{bucket}")
}
