use crate::task::{TaskRegistry, TaskSpec};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::{interval, timeout, MissedTickBehavior};

/// Bounded run history kept for introspection.
const RUN_HISTORY_LIMIT: usize = 32;

/// State machine of one scheduled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// One scheduled (or manually triggered) run, across all its attempts.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub task: String,
    pub state: RunState,
    /// Attempts consumed so far, including the first.
    pub attempts: u32,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub outcome: Option<Value>,
}

/// Read-only snapshot of scheduler state for the administrative surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchedulerStatus {
    /// Most recent runs, newest first.
    pub recent_runs: Vec<RunRecord>,
    /// Next scheduled fire time per task.
    pub next_runs: HashMap<String, DateTime<Utc>>,
    /// Run id currently executing, if any.
    pub in_flight: Option<String>,
}

#[derive(Default)]
struct StatusInner {
    recent: VecDeque<RunRecord>,
    next_runs: HashMap<String, DateTime<Utc>>,
    in_flight: Option<String>,
}

/// Drives the registered tasks: one interval loop per task, retries with
/// backoff on failure, soft/hard time limits per attempt.
///
/// All runs are serialized through a single-flight guard: at most one task
/// executes at a time, so two scans can never overlap and store mutations
/// never race each other.
pub struct Scheduler {
    registry: TaskRegistry,
    status: Mutex<StatusInner>,
    run_guard: tokio::sync::Mutex<()>,
}

impl Scheduler {
    pub fn new(registry: TaskRegistry) -> Self {
        Self {
            registry,
            status: Mutex::new(StatusInner::default()),
            run_guard: tokio::sync::Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Snapshot of recent runs, next fire times, and the in-flight run.
    pub fn status(&self) -> SchedulerStatus {
        let inner = self.lock_status();
        SchedulerStatus {
            recent_runs: inner.recent.iter().cloned().collect(),
            next_runs: inner.next_runs.clone(),
            in_flight: inner.in_flight.clone(),
        }
    }

    /// Runs every registered task on its schedule until the process exits.
    pub async fn start(self: Arc<Self>) {
        if self.registry.is_empty() {
            tracing::warn!("No scheduled tasks registered");
            return;
        }

        let now = Utc::now();
        {
            let mut inner = self.lock_status();
            for spec in self.registry.specs() {
                inner.next_runs.insert(spec.task.name().to_string(), now);
            }
        }

        let mut handles = Vec::new();
        for idx in 0..self.registry.len() {
            let scheduler = self.clone();
            handles.push(tokio::spawn(async move { scheduler.run_loop(idx).await }));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Scheduler loop panicked");
            }
        }
    }

    /// Executes one task immediately, honoring the single-flight guard.
    ///
    /// Backs the administrative trigger-scan/trigger-cleanup operations.
    /// Returns `None` for an unknown task name.
    pub async fn run_task_now(&self, name: &str) -> Option<RunRecord> {
        let spec = self.registry.get(name)?;
        Some(self.execute(spec).await)
    }

    async fn run_loop(&self, idx: usize) {
        let spec = &self.registry.specs()[idx];
        let name = spec.task.name().to_string();
        tracing::info!(
            task = %name,
            interval_secs = spec.interval.as_secs(),
            "Task schedule started"
        );

        let mut tick = interval(spec.interval);
        // Retries may outlast the interval; fire late instead of bursting
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            self.execute(spec).await;

            let next = Utc::now()
                + chrono::Duration::from_std(spec.interval)
                    .unwrap_or_else(|_| chrono::Duration::zero());
            self.lock_status().next_runs.insert(name.clone(), next);
        }
    }

    /// One run: attempt, retry with backoff on failure, record the outcome.
    async fn execute(&self, spec: &TaskSpec) -> RunRecord {
        let name = spec.task.name().to_string();
        let mut record = RunRecord {
            run_id: riskmon_common::id::next_id(),
            task: name.clone(),
            state: RunState::Queued,
            attempts: 0,
            queued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
            outcome: None,
        };
        self.push_record(record.clone());

        let _flight = self.run_guard.lock().await;

        record.state = RunState::Running;
        record.started_at = Some(Utc::now());
        self.update_record(&record);
        self.lock_status().in_flight = Some(record.run_id.clone());

        for attempt in 0..=spec.retry.max_retries {
            record.attempts = attempt + 1;
            self.update_record(&record);

            match run_with_limits(&name, spec).await {
                Ok(outcome) => {
                    record.state = RunState::Succeeded;
                    record.outcome = Some(outcome);
                    record.error = None;
                    record.finished_at = Some(Utc::now());
                    tracing::info!(
                        task = %name,
                        run_id = %record.run_id,
                        attempts = record.attempts,
                        "Scheduled run succeeded"
                    );
                    break;
                }
                Err(e) => {
                    record.error = Some(e.to_string());
                    if attempt < spec.retry.max_retries {
                        let delay = spec.retry.delay(attempt);
                        tracing::warn!(
                            task = %name,
                            attempt = record.attempts,
                            delay_secs = delay.as_secs(),
                            error = %e,
                            "Scheduled run attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        record.state = RunState::Failed;
                        record.finished_at = Some(Utc::now());
                        tracing::error!(
                            task = %name,
                            run_id = %record.run_id,
                            attempts = record.attempts,
                            error = %e,
                            "Scheduled run failed, retry budget exhausted"
                        );
                    }
                }
            }
        }

        self.lock_status().in_flight = None;
        self.update_record(&record);
        record
    }

    /// Lock the status map, recovering from a poisoned Mutex if necessary.
    fn lock_status(&self) -> MutexGuard<'_, StatusInner> {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push_record(&self, record: RunRecord) {
        let mut inner = self.lock_status();
        inner.recent.push_front(record);
        inner.recent.truncate(RUN_HISTORY_LIMIT);
    }

    fn update_record(&self, record: &RunRecord) {
        let mut inner = self.lock_status();
        if let Some(slot) = inner
            .recent
            .iter_mut()
            .find(|r| r.run_id == record.run_id)
        {
            *slot = record.clone();
        }
    }
}

/// Runs one attempt under the soft/hard time limits.
///
/// Past the soft limit the run gets a warning and keeps going; at the hard
/// limit the future is dropped, which cancels it at its next await point.
async fn run_with_limits(name: &str, spec: &TaskSpec) -> anyhow::Result<Value> {
    let fut = spec.task.run();
    tokio::pin!(fut);

    match timeout(spec.soft_limit, &mut fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                task = name,
                limit_secs = spec.soft_limit.as_secs(),
                "Soft time limit exceeded, letting the run finish"
            );
            let remaining = spec.hard_limit.saturating_sub(spec.soft_limit);
            match timeout(remaining, &mut fut).await {
                Ok(result) => result,
                Err(_) => anyhow::bail!(
                    "hard time limit of {}s exceeded",
                    spec.hard_limit.as_secs()
                ),
            }
        }
    }
}
