// src/tasks/mod.rs

//! Task model and the honeycomb-backed task queue.

pub mod model;
pub mod queue;

pub use model::{QueueCounts, Task, TaskBuckets, TaskEntry, TaskStatus, DEFAULT_MAX_ATTEMPTS};
pub use queue::{FailDisposition, TaskQueue};
