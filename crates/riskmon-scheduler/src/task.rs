use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Backoff parameters applied when a scheduled run fails.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 means one attempt only.
    pub max_retries: u32,
    pub backoff_base_secs: u64,
    pub backoff_cap_secs: u64,
}

impl RetryPolicy {
    /// Delay before re-running after the given failed attempt (0-based):
    /// `base * 2^attempt`, bounded by the cap.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let secs = self
            .backoff_base_secs
            .saturating_mul(factor)
            .min(self.backoff_cap_secs);
        Duration::from_secs(secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_secs: 60,
            backoff_cap_secs: 900,
        }
    }
}

/// A unit of scheduled work.
///
/// The returned value is a task-specific summary surfaced through scheduler
/// introspection (e.g., the scan's stored/notified counts).
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    /// Unique task name, used as the registry key and in run records.
    fn name(&self) -> &str;

    /// Executes one run.
    ///
    /// # Errors
    ///
    /// Returns an error when the run failed; the scheduler retries it per
    /// the registered [`RetryPolicy`].
    async fn run(&self) -> Result<Value>;
}

/// A registered task with its schedule and execution limits.
pub struct TaskSpec {
    pub task: Arc<dyn ScheduledTask>,
    pub interval: Duration,
    pub retry: RetryPolicy,
    /// Exceeding this emits a warning but lets the run finish.
    pub soft_limit: Duration,
    /// Exceeding this force-terminates the run; counts as a failed attempt.
    pub hard_limit: Duration,
}

/// Explicit name-to-handler mapping consumed by the scheduler loop.
#[derive(Default)]
pub struct TaskRegistry {
    specs: Vec<TaskSpec>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: TaskSpec) {
        self.specs.push(spec);
    }

    pub fn specs(&self) -> &[TaskSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&TaskSpec> {
        self.specs.iter().find(|spec| spec.task.name() == name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
