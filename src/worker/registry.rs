// src/worker/registry.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::worker::{Worker, WorkerContext};

/// Builds a fresh worker instance for each dispatch.
pub type WorkerFactory = Arc<dyn Fn(&WorkerContext) -> Box<dyn Worker> + Send + Sync>;

/// Worker-type name -> factory. Populated once in the composition root.
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    factories: BTreeMap<String, WorkerFactory>,
}

impl fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("worker_types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the factory for `worker_type`.
    pub fn register<F>(&mut self, worker_type: impl Into<String>, factory: F)
    where
        F: Fn(&WorkerContext) -> Box<dyn Worker> + Send + Sync + 'static,
    {
        let worker_type = worker_type.into();
        if self.factories.contains_key(&worker_type) {
            warn!(worker_type = %worker_type, "replacing existing worker registration");
        } else {
            debug!(worker_type = %worker_type, "registered worker type");
        }
        self.factories.insert(worker_type, Arc::new(factory));
    }

    pub fn contains(&self, worker_type: &str) -> bool {
        self.factories.contains_key(worker_type)
    }

    pub fn get(&self, worker_type: &str) -> Option<&WorkerFactory> {
        self.factories.get(worker_type)
    }

    pub fn worker_types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
