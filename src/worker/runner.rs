// src/worker/runner.rs

//! Wrapper around a single `work` call.

use std::any::Any;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::tasks::Task;
use crate::worker::{ResultEnvelope, Worker};

/// Run `worker` once and fold every outcome into a [`ResultEnvelope`].
///
/// The call runs on its own Tokio task so that a panic or a timeout is
/// contained. On timeout the task is aborted; for [`crate::worker::CommandWorker`]
/// that drops the child handle, which kills the process. Nothing escapes
/// this function as an error.
pub async fn run_worker(
    worker_type: &str,
    worker_id: String,
    mut worker: Box<dyn Worker>,
    task: Option<Task>,
    timeout: Duration,
) -> ResultEnvelope {
    let started = Instant::now();
    let task_id = task.as_ref().map(|t| t.id.clone());

    info!(
        worker_type,
        worker_id = %worker_id,
        task_id = ?task_id,
        "starting work"
    );

    let handle = tokio::spawn(async move { worker.work(task).await });
    let abort = handle.abort_handle();

    let outcome = match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(err))) => Err(format!("{err:#}")),
        Ok(Err(join_err)) if join_err.is_panic() => {
            let message = panic_message(join_err.into_panic());
            error!(worker_type, worker_id = %worker_id, panic = %message, "worker panicked");
            Err(format!("worker panicked: {message}"))
        }
        Ok(Err(join_err)) => Err(format!("worker task cancelled: {join_err}")),
        Err(_) => {
            abort.abort();
            Err(format!("worker timed out after {}s", timeout.as_secs_f64()))
        }
    };

    let duration = started.elapsed().as_secs_f64();
    match outcome {
        Ok(value) => {
            info!(worker_type, worker_id = %worker_id, duration, "work complete");
            ResultEnvelope::succeeded(worker_id, value, duration)
        }
        Err(message) => {
            warn!(worker_type, worker_id = %worker_id, duration, error = %message, "work failed");
            ResultEnvelope::failed(worker_id, message, duration)
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
