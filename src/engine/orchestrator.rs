// src/engine/orchestrator.rs

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::HiveConfig;
use crate::engine::breaker::{BreakerTransition, FailurePolicy};
use crate::engine::WorkerType;
use crate::errors::Result;
use crate::honeycomb::{AlertLevel, HoneycombStore, STATE_DOC};
use crate::schedule::{EventTable, Schedule};
use crate::tasks::{FailDisposition, QueueCounts, Task, TaskQueue};
use crate::worker::{new_worker_id, run_worker, ResultEnvelope, WorkerContext, WorkerRegistry};

/// Why a dispatch never reached a worker.
///
/// Distinct from a worker that ran and failed, which is a
/// [`ResultEnvelope`] with `success == false`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("unknown worker type {0:?}")]
    UnknownWorker(WorkerType),

    #[error("worker type {worker_type:?} is quarantined after {failures} consecutive failures")]
    Quarantined { worker_type: WorkerType, failures: u32 },
}

impl DispatchError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::UnknownWorker(_) => "unknown_worker",
            DispatchError::Quarantined { .. } => "quarantined",
        }
    }
}

/// One dispatch attempt and how it ended.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker_type: WorkerType,
    pub outcome: std::result::Result<ResultEnvelope, DispatchError>,
}

impl WorkerReport {
    pub fn ran_successfully(&self) -> bool {
        matches!(&self.outcome, Ok(envelope) if envelope.success)
    }

    pub fn is_rejected(&self) -> bool {
        self.outcome.is_err()
    }

    /// JSON rendering for the CLI.
    pub fn to_json(&self) -> Value {
        match &self.outcome {
            Ok(envelope) => json!({
                "worker_type": self.worker_type,
                "dispatched": true,
                "envelope": envelope,
            }),
            Err(err) => json!({
                "worker_type": self.worker_type,
                "dispatched": false,
                "code": err.code(),
                "error": err.to_string(),
            }),
        }
    }
}

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Default)]
pub struct ScheduleReport {
    pub dispatched: Vec<WorkerReport>,
}

/// Outcome of one task-queue drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Tasks taken from the pending snapshot.
    pub examined: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
    /// Tasks claimed by someone else between snapshot and claim.
    pub skipped: usize,
}

/// What the orchestrator knows about the hive right now.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub last_heartbeat: Option<String>,
    pub broadcast_status: String,
    pub tasks: QueueCounts,
    pub alerts_pending: usize,
    pub registered_workers: Vec<String>,
    pub quarantined_workers: Vec<String>,
}

/// Owns everything one orchestrator instance needs.
///
/// There is no global state: failure counters and the document cache live
/// here, so independent orchestrators can coexist (tests rely on this).
#[derive(Debug)]
pub struct Orchestrator {
    config: HiveConfig,
    registry: WorkerRegistry,
    store: HoneycombStore,
    queue: TaskQueue,
    breaker: FailurePolicy,
    schedule: Schedule,
    events: EventTable,
}

impl Orchestrator {
    pub fn new(config: HiveConfig, registry: WorkerRegistry, store: HoneycombStore) -> Self {
        let queue = TaskQueue::new(store.clone(), config.hive.actor.clone());
        let breaker = FailurePolicy::new(config.hive.max_failures);
        let schedule = Schedule::from_entries(&config.schedule);
        let events = EventTable::new(config.events.clone());

        Self {
            config,
            registry,
            store,
            queue,
            breaker,
            schedule,
            events,
        }
    }

    pub fn config(&self) -> &HiveConfig {
        &self.config
    }

    pub fn store(&self) -> &HoneycombStore {
        &self.store
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    pub fn breaker(&self) -> &FailurePolicy {
        &self.breaker
    }

    fn actor(&self) -> &str {
        &self.config.hive.actor
    }

    /// Swap in the schedule and event tables of a freshly loaded config.
    ///
    /// Failure counters survive; a lowered threshold takes effect on the
    /// next check. The honeycomb location and registered workers do not
    /// change.
    pub fn apply_config(&mut self, config: HiveConfig) {
        self.breaker.set_threshold(config.hive.max_failures);
        self.schedule = Schedule::from_entries(&config.schedule);
        self.events = EventTable::new(config.events.clone());
        self.config = config;
        info!(
            schedules = self.schedule.len(),
            events = self.events.events().count(),
            "configuration applied"
        );
    }

    /// Instantiate and run one worker.
    ///
    /// Rejections are checked before anything is instantiated: a quarantined
    /// worker type costs one log line and nothing else.
    pub async fn dispatch(
        &mut self,
        worker_type: &str,
        task: Option<Task>,
    ) -> std::result::Result<ResultEnvelope, DispatchError> {
        if let Err(failures) = self.breaker.check(worker_type) {
            warn!(worker_type, failures, "dispatch refused: worker type quarantined");
            return Err(DispatchError::Quarantined {
                worker_type: worker_type.to_string(),
                failures,
            });
        }

        let Some(factory) = self.registry.get(worker_type) else {
            warn!(worker_type, "dispatch refused: unknown worker type");
            return Err(DispatchError::UnknownWorker(worker_type.to_string()));
        };

        let ctx = WorkerContext {
            worker_type: worker_type.to_string(),
            worker_id: new_worker_id(worker_type),
            store: self.store.clone(),
        };
        let worker = factory(&ctx);
        let timeout = self.config.worker_timeout(worker_type);

        let envelope = run_worker(worker_type, ctx.worker_id, worker, task, timeout).await;

        if envelope.success {
            self.breaker.record_success(worker_type);
        } else if let BreakerTransition::Tripped { failures } =
            self.breaker.record_failure(worker_type)
        {
            self.alert_quarantine(worker_type, failures, envelope.error.as_deref());
        }

        Ok(envelope)
    }

    fn alert_quarantine(&self, worker_type: &str, failures: u32, last_error: Option<&str>) {
        let message = match last_error {
            Some(err) => format!(
                "Worker {worker_type} quarantined after {failures} consecutive failures (last error: {err})"
            ),
            None => format!("Worker {worker_type} quarantined after {failures} consecutive failures"),
        };
        if let Err(err) = self
            .store
            .post_alert(&message, self.actor(), AlertLevel::Priority)
        {
            warn!(worker_type, error = %err, "failed to post quarantine alert");
        }
    }

    /// Manually release a worker type from quarantine.
    pub fn reset_quarantine(&mut self, worker_type: &str) -> bool {
        let released = self.breaker.reset(worker_type);
        if released {
            info!(worker_type, "quarantine reset");
        }
        released
    }

    /// Wake every worker type mapped to `event`, in configured order.
    pub async fn trigger(&mut self, event: &str, data: Value) -> Vec<WorkerReport> {
        let worker_types = self.events.workers_for(event).to_vec();
        if worker_types.is_empty() {
            debug!(event, "event has no listeners");
            return Vec::new();
        }

        info!(event, workers = ?worker_types, "event triggered");
        let mut reports = Vec::with_capacity(worker_types.len());
        for worker_type in worker_types {
            let task = Task::for_event(worker_type.clone(), event, data.clone());
            let outcome = self.dispatch(&worker_type, Some(task)).await;
            reports.push(WorkerReport {
                worker_type,
                outcome,
            });
        }
        reports
    }

    /// Dispatch every due scheduled worker type.
    ///
    /// Each worker's last run is persisted right after its dispatch, so a
    /// crash mid-tick does not re-run the ones that already went.
    pub async fn run_schedule(&mut self) -> Result<ScheduleReport> {
        let state = self.store.read(STATE_DOC)?;
        let last_runs = state
            .pointer("/scheduler/last_runs")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let due = self.schedule.due(Utc::now(), &last_runs);
        let mut report = ScheduleReport::default();

        for entry in due {
            let started = Utc::now();
            debug!(worker_type = %entry.worker_type, reason = ?entry.reason, "scheduled dispatch");
            let outcome = self.dispatch(&entry.worker_type, None).await;

            let mut runs = serde_json::Map::new();
            runs.insert(entry.worker_type.clone(), Value::String(started.to_rfc3339()));
            self.store.update(
                STATE_DOC,
                json!({ "scheduler": { "last_runs": runs } }),
                &self.config.hive.actor,
            )?;

            report.dispatched.push(WorkerReport {
                worker_type: entry.worker_type,
                outcome,
            });
        }

        self.store.update(
            STATE_DOC,
            json!({ "scheduler": { "last_schedule_check": Utc::now().to_rfc3339() } }),
            &self.config.hive.actor,
        )?;

        Ok(report)
    }

    /// Dispatch up to `drain_batch_size` pending tasks.
    ///
    /// Tasks without a worker type are left for out-of-process workers.
    /// Tasks for a quarantined worker type stay pending without spending an
    /// attempt.
    pub async fn process_task_queue(&mut self) -> Result<DrainReport> {
        let limit = self.config.hive.drain_batch_size;
        let breaker = &self.breaker;
        let batch = self.queue.pending_batch(limit, |task| match task.worker_type() {
            Some(worker_type) => !breaker.is_quarantined(worker_type),
            None => false,
        })?;

        let mut report = DrainReport::default();

        for snapshot in batch {
            report.examined += 1;

            let Some(worker_type) = snapshot.bee_type.clone() else {
                continue;
            };
            if self.breaker.is_quarantined(&worker_type) {
                report.skipped += 1;
                continue;
            }

            let Some(task) = self.queue.claim(&snapshot.id)? else {
                report.skipped += 1;
                continue;
            };
            let task_id = task.id.clone();

            match self.dispatch(&worker_type, Some(task)).await {
                Ok(envelope) if envelope.success => {
                    if self.queue.complete(&task_id, envelope.result)? {
                        report.completed += 1;
                    }
                }
                Ok(envelope) => {
                    let error = envelope.error.unwrap_or_else(|| "worker failed".to_string());
                    match self.queue.fail(&task_id, &error)? {
                        Some(FailDisposition::Retry) => report.retried += 1,
                        Some(FailDisposition::DeadLetter) => report.failed += 1,
                        None => {}
                    }
                }
                Err(err @ DispatchError::UnknownWorker(_)) => {
                    if self.queue.dead_letter(&task_id, &err.to_string())? {
                        report.failed += 1;
                    }
                }
                Err(err @ DispatchError::Quarantined { .. }) => {
                    match self.queue.fail(&task_id, &err.to_string())? {
                        Some(FailDisposition::Retry) => report.retried += 1,
                        Some(FailDisposition::DeadLetter) => report.failed += 1,
                        None => {}
                    }
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                completed = report.completed,
                retried = report.retried,
                failed = report.failed,
                "task queue drained"
            );
        }
        Ok(report)
    }

    /// Append a task to the queue on behalf of this orchestrator.
    pub fn enqueue(&self, task: Task) -> Result<String> {
        self.queue.enqueue(task)
    }

    /// Record liveness in `state.queen` and return a health snapshot.
    pub fn heartbeat(&self) -> Result<HealthSnapshot> {
        self.store.update(
            STATE_DOC,
            json!({
                "queen": {
                    "last_heartbeat": Utc::now().to_rfc3339(),
                    "status": "alive",
                }
            }),
            self.actor(),
        )?;
        let snapshot = self.health()?;
        debug!(
            pending = snapshot.tasks.pending,
            alerts_pending = snapshot.alerts_pending,
            "heartbeat"
        );
        Ok(snapshot)
    }

    /// Read-only health snapshot.
    pub fn health(&self) -> Result<HealthSnapshot> {
        let state = self.store.read(STATE_DOC)?;

        let last_heartbeat = state
            .pointer("/queen/last_heartbeat")
            .and_then(Value::as_str)
            .map(str::to_string);
        let broadcast_status = state
            .pointer("/broadcast/status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let alerts_pending = state
            .pointer("/alerts/priority")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);

        Ok(HealthSnapshot {
            status: "alive",
            last_heartbeat,
            broadcast_status,
            tasks: self.queue.counts()?,
            alerts_pending,
            registered_workers: self.registry.worker_types().map(str::to_string).collect(),
            quarantined_workers: self.breaker.quarantined(),
        })
    }
}
