// src/engine/runtime.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::engine::orchestrator::{DrainReport, HealthSnapshot, Orchestrator, ScheduleReport};
use crate::errors::Result;

/// How long the loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One iteration; an iteration error is returned to the caller.
    Once,
    /// Until stopped; iteration errors are logged and followed by a pause.
    Forever,
}

/// Requests a graceful stop of a [`Runtime`].
///
/// Clones share the same flag. The stop is observed between iterations and
/// during the inter-iteration sleep; a worker that is already running
/// finishes first.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Asks a [`Runtime`] to re-read its config file before the next iteration.
#[derive(Debug, Clone, Default)]
pub struct ReloadHandle {
    requested: Arc<AtomicBool>,
}

impl ReloadHandle {
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    fn take(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}

/// Everything one loop iteration did.
#[derive(Debug, Clone)]
pub struct IterationReport {
    pub health: HealthSnapshot,
    pub schedule: ScheduleReport,
    pub drain: DrainReport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub iterations: u64,
    pub failed_iterations: u64,
}

/// The main loop: heartbeat, scheduler tick, queue drain, sleep.
pub struct Runtime {
    orchestrator: Orchestrator,
    stop: StopHandle,
    stop_rx: watch::Receiver<bool>,
    reload: ReloadHandle,
}

impl Runtime {
    pub fn new(orchestrator: Orchestrator) -> Self {
        let (tx, stop_rx) = watch::channel(false);
        Self {
            orchestrator,
            stop: StopHandle { tx: Arc::new(tx) },
            stop_rx,
            reload: ReloadHandle::default(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn reload_handle(&self) -> ReloadHandle {
        self.reload.clone()
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    pub fn into_orchestrator(self) -> Orchestrator {
        self.orchestrator
    }

    /// Run the loop until `mode` says to stop.
    pub async fn run(&mut self, mode: RunMode) -> Result<LoopSummary> {
        let mut summary = LoopSummary::default();
        info!(?mode, "queenbee runtime started");

        loop {
            if self.stop.is_stopped() {
                info!("stop requested, leaving main loop");
                break;
            }

            summary.iterations += 1;
            let outcome = self.iterate().await;

            let hive = &self.orchestrator.config().hive;
            let interval = Duration::from_secs(hive.heartbeat_interval_seconds);
            let error_pause = Duration::from_secs(hive.error_pause_seconds);

            let pause = match outcome {
                Ok(report) => {
                    debug!(
                        scheduled = report.schedule.dispatched.len(),
                        drained = report.drain.examined,
                        "iteration complete"
                    );
                    interval
                }
                Err(err) => {
                    summary.failed_iterations += 1;
                    if mode == RunMode::Once {
                        return Err(err);
                    }
                    error!(error = %err, pause_secs = error_pause.as_secs(), "iteration failed");
                    error_pause
                }
            };

            if mode == RunMode::Once {
                break;
            }
            if self.sleep_or_stop(pause).await {
                info!("stop requested during sleep");
                break;
            }
        }

        info!(
            iterations = summary.iterations,
            failed_iterations = summary.failed_iterations,
            "queenbee runtime exiting"
        );
        Ok(summary)
    }

    /// One heartbeat, one scheduler tick and one queue drain.
    ///
    /// A pending reload request is honoured first. A config that fails to
    /// load is logged and the current one kept.
    pub async fn iterate(&mut self) -> Result<IterationReport> {
        if self.reload.take() {
            self.reload_config();
        }

        let health = self.orchestrator.heartbeat()?;
        let schedule = self.orchestrator.run_schedule().await?;
        let drain = self.orchestrator.process_task_queue().await?;
        Ok(IterationReport {
            health,
            schedule,
            drain,
        })
    }

    fn reload_config(&mut self) {
        match self.orchestrator.config().reload() {
            Ok(config) => self.orchestrator.apply_config(config),
            Err(err) => warn!(error = %err, "config reload failed; keeping current config"),
        }
    }

    /// Sleep for `duration`; returns `true` if a stop was requested meanwhile.
    async fn sleep_or_stop(&mut self, duration: Duration) -> bool {
        if *self.stop_rx.borrow_and_update() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.stop.is_stopped(),
            changed = self.stop_rx.changed() => changed.is_err() || *self.stop_rx.borrow(),
        }
    }
}
