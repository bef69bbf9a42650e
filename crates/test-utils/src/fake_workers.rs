use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use serde_json::Value;

use queenbee::tasks::Task;
use queenbee::worker::{WorkFuture, Worker, WorkerRegistry};

/// What a [`ScriptedWorker`] does when invoked.
#[derive(Debug, Clone)]
pub enum Script {
    /// Return this value.
    Succeed(Value),
    /// Return an error with this message.
    Fail(String),
    /// Panic with this message.
    Panic(String),
    /// Sleep, then return `null`.
    Sleep(Duration),
    /// The n-th call (across all instances of the worker type) follows the
    /// n-th script; the last one repeats.
    Sequence(Vec<Script>),
}

impl Script {
    fn for_call(&self, call: usize) -> Script {
        match self {
            Script::Sequence(steps) => steps
                .get(call)
                .or_else(|| steps.last())
                .cloned()
                .unwrap_or(Script::Succeed(Value::Null)),
            other => other.clone(),
        }
    }
}

/// Shared view of what a scripted worker type has been asked to do.
#[derive(Debug, Clone, Default)]
pub struct Invocations {
    count: Arc<AtomicUsize>,
    tasks: Arc<Mutex<Vec<Option<Task>>>>,
}

impl Invocations {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Tasks received, in call order (`None` for scheduled wake-ups).
    pub fn tasks(&self) -> Vec<Option<Task>> {
        self.tasks.lock().unwrap().clone()
    }

    fn record(&self, task: &Option<Task>) {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.tasks.lock().unwrap().push(task.clone());
    }
}

/// A fake worker that:
/// - records every invocation (and its task) in a shared [`Invocations`]
/// - then follows its [`Script`].
pub struct ScriptedWorker {
    script: Script,
    invocations: Invocations,
}

impl Worker for ScriptedWorker {
    fn work(&mut self, task: Option<Task>) -> WorkFuture<'_> {
        let script = self.script.for_call(self.invocations.count());
        self.invocations.record(&task);
        Box::pin(async move {
            match script {
                Script::Succeed(value) => Ok(value),
                Script::Fail(msg) => Err(anyhow!(msg)),
                Script::Panic(msg) => panic!("{msg}"),
                Script::Sleep(duration) => {
                    tokio::time::sleep(duration).await;
                    Ok(Value::Null)
                }
                Script::Sequence(_) => Ok(Value::Null),
            }
        })
    }
}

/// Register `worker_type` as a scripted worker and return its invocation log.
pub fn register_scripted(
    registry: &mut WorkerRegistry,
    worker_type: &str,
    script: Script,
) -> Invocations {
    let invocations = Invocations::default();
    let shared = invocations.clone();
    registry.register(worker_type, move |_ctx| {
        Box::new(ScriptedWorker {
            script: script.clone(),
            invocations: shared.clone(),
        })
    });
    invocations
}

/// A worker that fails on every call, as in a broken integration.
pub fn register_always_fails(registry: &mut WorkerRegistry, worker_type: &str) -> Invocations {
    register_scripted(
        registry,
        worker_type,
        Script::Fail(format!("{worker_type} always fails")),
    )
}
