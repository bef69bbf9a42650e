// src/worker/builtin.rs

use serde_json::{json, Value};

use crate::tasks::Task;
use crate::worker::{WorkFuture, Worker};

/// Returns its task's payload (or `null` for scheduled wake-ups).
///
/// Registered as `echo`; handy for smoke-testing a honeycomb.
#[derive(Debug, Default)]
pub struct EchoWorker;

impl Worker for EchoWorker {
    fn work(&mut self, task: Option<Task>) -> WorkFuture<'_> {
        Box::pin(async move {
            let echoed = match task {
                Some(task) => json!({
                    "task_id": task.id,
                    "triggered_by": task.triggered_by,
                    "payload": task.payload,
                }),
                None => Value::Null,
            };
            Ok(echoed)
        })
    }
}

/// Adapts a synchronous closure to the [`Worker`] contract.
pub struct FnWorker<F> {
    f: F,
}

impl<F> FnWorker<F>
where
    F: FnMut(Option<Task>) -> anyhow::Result<Value> + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Worker for FnWorker<F>
where
    F: FnMut(Option<Task>) -> anyhow::Result<Value> + Send,
{
    fn work(&mut self, task: Option<Task>) -> WorkFuture<'_> {
        let outcome = (self.f)(task);
        Box::pin(async move { outcome })
    }
}
