// src/worker/mod.rs

//! Worker ("bee") contract.
//!
//! The orchestrator only knows workers through [`Worker::work`]. Everything a
//! worker does internally is its own business; the orchestrator times the
//! call, contains failures and records the outcome as a [`ResultEnvelope`].
//!
//! - [`envelope`] defines the result envelope.
//! - [`runner`] wraps a single `work` call (timing, panics, timeouts).
//! - [`registry`] maps worker-type names to factories.
//! - [`command`] runs a worker as an external process.
//! - [`builtin`] holds small in-process workers and a closure adapter.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde_json::Value;

use crate::honeycomb::HoneycombStore;
use crate::tasks::Task;

pub mod builtin;
pub mod command;
pub mod envelope;
pub mod registry;
pub mod runner;

pub use builtin::{EchoWorker, FnWorker};
pub use command::CommandWorker;
pub use envelope::ResultEnvelope;
pub use registry::{WorkerFactory, WorkerRegistry};
pub use runner::run_worker;

/// Future returned by [`Worker::work`].
pub type WorkFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'a>>;

/// A unit of domain logic invoked by the orchestrator.
///
/// `task` is `None` for scheduled wake-ups and `Some` for queued or
/// event-triggered work. Returning `Err` is an explicit failure and counts
/// towards the worker type's quarantine threshold.
pub trait Worker: Send {
    fn work(&mut self, task: Option<Task>) -> WorkFuture<'_>;
}

/// What a factory gets when the orchestrator instantiates a worker.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub worker_type: String,
    /// Fresh per instantiation; for logs and attribution only.
    pub worker_id: String,
    pub store: HoneycombStore,
}

impl WorkerContext {
    pub fn honeycomb_dir(&self) -> PathBuf {
        self.store.root().to_path_buf()
    }
}

/// `<worker_type>_<8 hex chars>`.
pub fn new_worker_id(worker_type: &str) -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("{worker_type}_{}", &uuid[..8])
}
