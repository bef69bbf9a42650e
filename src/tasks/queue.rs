// src/tasks/queue.rs

//! At-least-once task queue stored in `tasks.json`.
//!
//! Every operation is a whole-document read-modify-write through the
//! [`HoneycombStore`]. Lookups that miss (unknown id, task already moved on)
//! are ordinary outcomes and return `None` / `false` rather than errors.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::{HiveError, Result};
use crate::honeycomb::{HoneycombStore, TASKS_DOC};
use crate::tasks::model::{new_task_id, QueueCounts, Task, TaskBuckets, TaskStatus};

/// What `fail` did with a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailDisposition {
    /// Attempts remain; the task went back to `pending`.
    Retry,
    /// Attempts exhausted; the task is now in `failed` for good.
    DeadLetter,
}

#[derive(Debug, Clone)]
pub struct TaskQueue {
    store: HoneycombStore,
    actor: String,
}

impl TaskQueue {
    /// Queue over `store`; writes are attributed to `actor`.
    pub fn new(store: HoneycombStore, actor: impl Into<String>) -> Self {
        Self {
            store,
            actor: actor.into(),
        }
    }

    /// Decode `tasks.json`. Records that are not valid tasks are kept as-is
    /// and logged; they never fail the load.
    pub fn load(&self) -> Result<TaskBuckets> {
        let doc = self.store.read(TASKS_DOC)?;
        let buckets: TaskBuckets =
            serde_json::from_value(doc).map_err(|e| HiveError::TaskDocument(e.to_string()))?;
        for (status, entry) in buckets.malformed() {
            warn!(
                bucket = status.bucket(),
                error = entry.decode_error().unwrap_or_default(),
                "skipping malformed task record"
            );
        }
        Ok(buckets)
    }

    fn save(&self, buckets: &TaskBuckets) -> Result<()> {
        let doc = serde_json::to_value(buckets)?;
        self.store.write(TASKS_DOC, doc, &self.actor)?;
        Ok(())
    }

    /// Append `task` to `pending` and return its id.
    pub fn enqueue(&self, mut task: Task) -> Result<String> {
        let mut buckets = self.load()?;

        if task.id.is_empty() {
            task.id = new_task_id();
        } else if let Some(existing) = buckets.locate(&task.id) {
            return Err(HiveError::TaskDocument(format!(
                "task id {} already exists in {}",
                task.id,
                existing.bucket()
            )));
        }

        task.status = TaskStatus::Pending;
        task.attempts = 0;
        task.max_attempts = task.max_attempts.max(1);
        task.created_at = Some(Utc::now());

        let id = task.id.clone();
        info!(task_id = %id, worker_type = ?task.bee_type, "task enqueued");
        buckets.push(TaskStatus::Pending, task);
        self.save(&buckets)?;
        Ok(id)
    }

    /// Move a pending task to `in_progress`, counting one attempt.
    ///
    /// `None` means the task was not pending (already claimed, finished, or
    /// never existed): nothing to do.
    pub fn claim(&self, task_id: &str) -> Result<Option<Task>> {
        let mut buckets = self.load()?;
        let Some(task) = buckets.take(TaskStatus::Pending, task_id) else {
            debug!(task_id, "claim: task not pending");
            return Ok(None);
        };
        self.claim_taken(buckets, task).map(Some)
    }

    /// Claim the oldest pending task addressed to `worker_type`.
    pub fn claim_next(&self, worker_type: &str) -> Result<Option<Task>> {
        let mut buckets = self.load()?;
        let Some(task) = buckets.take_pending_where(|t| t.worker_type() == Some(worker_type)) else {
            return Ok(None);
        };
        self.claim_taken(buckets, task).map(Some)
    }

    fn claim_taken(&self, mut buckets: TaskBuckets, mut task: Task) -> Result<Task> {
        task.status = TaskStatus::InProgress;
        task.claimed_at = Some(Utc::now());
        task.attempts += 1;

        debug!(task_id = %task.id, attempts = task.attempts, "task claimed");
        buckets.push(TaskStatus::InProgress, task.clone());
        self.save(&buckets)?;
        Ok(task)
    }

    /// Move an in-progress task to `completed`, attaching `result`.
    ///
    /// Returns `false` (and writes nothing) if the task is not in progress,
    /// which makes repeated completion a no-op.
    pub fn complete(&self, task_id: &str, result: Value) -> Result<bool> {
        let mut buckets = self.load()?;
        let Some(mut task) = buckets.take(TaskStatus::InProgress, task_id) else {
            debug!(task_id, "complete: task not in progress; ignoring");
            return Ok(false);
        };

        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        task.result = Some(result);

        info!(task_id, attempts = task.attempts, "task completed");
        buckets.push(TaskStatus::Completed, task);
        self.save(&buckets)?;
        Ok(true)
    }

    /// Record a failed attempt.
    ///
    /// The task returns to `pending` while `attempts < max_attempts`, and
    /// lands in `failed` otherwise. `None` if the task is not in progress.
    pub fn fail(&self, task_id: &str, error: &str) -> Result<Option<FailDisposition>> {
        let mut buckets = self.load()?;
        let Some(mut task) = buckets.take(TaskStatus::InProgress, task_id) else {
            debug!(task_id, "fail: task not in progress; ignoring");
            return Ok(None);
        };

        task.last_error = Some(error.to_string());
        task.failed_at = Some(Utc::now());

        let disposition = if task.can_retry() {
            task.status = TaskStatus::Pending;
            warn!(
                task_id,
                attempts = task.attempts,
                max_attempts = task.max_attempts,
                error,
                "task attempt failed; will retry"
            );
            buckets.push(TaskStatus::Pending, task);
            FailDisposition::Retry
        } else {
            task.status = TaskStatus::Failed;
            warn!(
                task_id,
                attempts = task.attempts,
                error,
                "task attempts exhausted; moved to failed"
            );
            buckets.push(TaskStatus::Failed, task);
            FailDisposition::DeadLetter
        };

        self.save(&buckets)?;
        Ok(Some(disposition))
    }

    /// Move an in-progress task straight to `failed`, regardless of attempts.
    ///
    /// Used when retrying cannot help (e.g. no such worker type).
    pub fn dead_letter(&self, task_id: &str, error: &str) -> Result<bool> {
        let mut buckets = self.load()?;
        let Some(mut task) = buckets.take(TaskStatus::InProgress, task_id) else {
            return Ok(false);
        };

        task.status = TaskStatus::Failed;
        task.last_error = Some(error.to_string());
        task.failed_at = Some(Utc::now());

        warn!(task_id, error, "task dead-lettered");
        buckets.push(TaskStatus::Failed, task);
        self.save(&buckets)?;
        Ok(true)
    }

    /// Up to `limit` pending tasks accepted by `dispatchable`, oldest first.
    ///
    /// This is a snapshot; nothing is claimed.
    pub fn pending_batch<F>(&self, limit: usize, mut dispatchable: F) -> Result<Vec<Task>>
    where
        F: FnMut(&Task) -> bool,
    {
        let buckets = self.load()?;
        Ok(buckets
            .tasks(TaskStatus::Pending)
            .filter(|t| dispatchable(*t))
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn counts(&self) -> Result<QueueCounts> {
        Ok(self.load()?.counts())
    }

    /// Look a task up in whichever bucket holds it.
    pub fn find(&self, task_id: &str) -> Result<Option<Task>> {
        let buckets = self.load()?;
        let Some(status) = buckets.locate(task_id) else {
            return Ok(None);
        };
        Ok(buckets.tasks(status).find(|t| t.id == task_id).cloned())
    }
}
