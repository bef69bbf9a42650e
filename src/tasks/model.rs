// src/tasks/model.rs

//! Task records and the four-bucket queue document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::engine::WorkerType;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Lifecycle status of a task. Mirrors the bucket the task lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn bucket(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// A unit of queued work addressed to a worker type.
///
/// Fields the orchestrator does not know about (written by bees or other
/// tools) are kept in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,

    #[serde(default, alias = "worker_type", skip_serializing_if = "Option::is_none")]
    pub bee_type: Option<WorkerType>,

    #[serde(default)]
    pub payload: Value,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub attempts: u32,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// New task for `worker_type` with an opaque payload.
    ///
    /// The id is left empty; [`crate::tasks::TaskQueue::enqueue`] assigns one.
    pub fn new(worker_type: impl Into<WorkerType>, payload: Value) -> Self {
        Self {
            id: String::new(),
            bee_type: Some(worker_type.into()),
            payload,
            status: TaskStatus::Pending,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            triggered_by: None,
            created_at: None,
            claimed_at: None,
            completed_at: None,
            failed_at: None,
            last_error: None,
            result: None,
            extra: Map::new(),
        }
    }

    /// Ephemeral task handed to every worker woken by an event.
    pub fn for_event(worker_type: impl Into<WorkerType>, event: &str, data: Value) -> Self {
        let mut task = Self::new(worker_type, data);
        task.id = new_task_id();
        task.triggered_by = Some(event.to_string());
        task.created_at = Some(Utc::now());
        task
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn worker_type(&self) -> Option<&str> {
        self.bee_type.as_deref()
    }

    /// Whether another failure would send this task back to `pending`.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

pub fn new_task_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One record in a bucket.
///
/// Records that do not decode as a [`Task`] (written by another tool, or
/// hand-edited) are kept verbatim and written back untouched. They count
/// towards bucket sizes but are never claimed or dispatched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaskEntry {
    Task(Task),
    Malformed(Value),
}

impl TaskEntry {
    pub fn as_task(&self) -> Option<&Task> {
        match self {
            TaskEntry::Task(task) => Some(task),
            TaskEntry::Malformed(_) => None,
        }
    }

    /// Why a malformed record does not decode; `None` for a task.
    pub fn decode_error(&self) -> Option<String> {
        match self {
            TaskEntry::Task(_) => None,
            TaskEntry::Malformed(raw) => Some(
                serde_json::from_value::<Task>(raw.clone())
                    .err()
                    .map_or_else(|| "unrecognised record".to_string(), |e| e.to_string()),
            ),
        }
    }
}

impl From<Task> for TaskEntry {
    fn from(task: Task) -> Self {
        TaskEntry::Task(task)
    }
}

/// A bucket that is not an array reads as empty.
fn lenient_bucket<'de, D>(deserializer: D) -> Result<Vec<TaskEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match serde_json::from_value::<Task>(item.clone()) {
                Ok(task) => TaskEntry::Task(task),
                Err(_) => TaskEntry::Malformed(item),
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// The `tasks.json` document: four buckets, each an ordered list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskBuckets {
    #[serde(default, deserialize_with = "lenient_bucket")]
    pub pending: Vec<TaskEntry>,
    #[serde(default, deserialize_with = "lenient_bucket")]
    pub in_progress: Vec<TaskEntry>,
    #[serde(default, deserialize_with = "lenient_bucket")]
    pub completed: Vec<TaskEntry>,
    #[serde(default, deserialize_with = "lenient_bucket")]
    pub failed: Vec<TaskEntry>,

    /// `_meta` and anything else stored alongside the buckets.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskBuckets {
    pub const STATUSES: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    pub fn bucket_mut(&mut self, status: TaskStatus) -> &mut Vec<TaskEntry> {
        match status {
            TaskStatus::Pending => &mut self.pending,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Completed => &mut self.completed,
            TaskStatus::Failed => &mut self.failed,
        }
    }

    pub fn bucket(&self, status: TaskStatus) -> &[TaskEntry] {
        match status {
            TaskStatus::Pending => &self.pending,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Completed => &self.completed,
            TaskStatus::Failed => &self.failed,
        }
    }

    /// Well-formed tasks in the bucket for `status`, in order.
    pub fn tasks(&self, status: TaskStatus) -> impl Iterator<Item = &Task> {
        self.bucket(status).iter().filter_map(TaskEntry::as_task)
    }

    pub fn push(&mut self, status: TaskStatus, task: Task) {
        self.bucket_mut(status).push(TaskEntry::Task(task));
    }

    /// Remove the task with `id` from the bucket for `status`.
    pub fn take(&mut self, status: TaskStatus, id: &str) -> Option<Task> {
        let bucket = self.bucket_mut(status);
        let index = bucket
            .iter()
            .position(|entry| entry.as_task().is_some_and(|t| t.id == id))?;
        match bucket.remove(index) {
            TaskEntry::Task(task) => Some(task),
            TaskEntry::Malformed(_) => None,
        }
    }

    /// Remove the first pending task `accept` picks.
    pub fn take_pending_where<F>(&mut self, mut accept: F) -> Option<Task>
    where
        F: FnMut(&Task) -> bool,
    {
        let index = self
            .pending
            .iter()
            .position(|entry| entry.as_task().is_some_and(&mut accept))?;
        match self.pending.remove(index) {
            TaskEntry::Task(task) => Some(task),
            TaskEntry::Malformed(_) => None,
        }
    }

    /// Bucket currently holding `id`, if any.
    pub fn locate(&self, id: &str) -> Option<TaskStatus> {
        Self::STATUSES
            .into_iter()
            .find(|status| self.tasks(*status).any(|t| t.id == id))
    }

    /// Malformed records with their bucket, for diagnostics.
    pub fn malformed(&self) -> impl Iterator<Item = (TaskStatus, &TaskEntry)> {
        Self::STATUSES.into_iter().flat_map(move |status| {
            self.bucket(status)
                .iter()
                .filter(|entry| entry.as_task().is_none())
                .map(move |entry| (status, entry))
        })
    }

    /// Raw bucket lengths, malformed records included.
    pub fn counts(&self) -> QueueCounts {
        QueueCounts {
            pending: self.pending.len(),
            in_progress: self.in_progress.len(),
            completed: self.completed.len(),
            failed: self.failed.len(),
        }
    }
}

/// Bucket sizes, reported by heartbeats and `status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}
