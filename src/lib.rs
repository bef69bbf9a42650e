// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod honeycomb;
pub mod logging;
pub mod schedule;
pub mod tasks;
pub mod worker;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{default_config_path, load_or_default, HiveConfig};
use crate::engine::{Orchestrator, ReloadHandle, RunMode, Runtime, StopHandle, WorkerReport};
use crate::honeycomb::HoneycombStore;
use crate::tasks::Task;
use crate::worker::{CommandWorker, EchoWorker, WorkerRegistry};

/// Process exit code for success, including "the worker ran and failed".
pub const EXIT_OK: i32 = 0;
/// Startup failure or a failed single-shot iteration.
pub const EXIT_FAILURE: i32 = 1;
/// A `spawn`/`trigger` dispatch was rejected (unknown or quarantined worker).
pub const EXIT_REJECTED: i32 = 2;

/// Event name used for tasks handed to `spawn --data`.
const MANUAL_TRIGGER: &str = "manual";

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading
/// - honeycomb store / worker registry / orchestrator
/// - the main loop and Ctrl-C handling (for `run`)
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let cfg = load_or_default(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let honeycomb = resolve_honeycomb(&cfg, &config_path, args.honeycomb.as_deref());

    match args.command {
        Command::Check => {
            print_check(&cfg, &honeycomb)?;
            Ok(EXIT_OK)
        }
        Command::Run => {
            let mut runtime = Runtime::new(open_orchestrator(cfg, &honeycomb)?);
            spawn_signal_handlers(runtime.stop_handle(), runtime.reload_handle());
            runtime.run(RunMode::Forever).await?;
            Ok(EXIT_OK)
        }
        Command::Once => {
            let mut runtime = Runtime::new(open_orchestrator(cfg, &honeycomb)?);
            runtime.run(RunMode::Once).await?;
            print_json(&serde_json::to_value(runtime.orchestrator().health()?)?)?;
            Ok(EXIT_OK)
        }
        Command::Spawn { worker, data } => {
            let task = match data {
                Some(raw) => Some(Task::for_event(
                    worker.clone(),
                    MANUAL_TRIGGER,
                    parse_data(&raw)?,
                )),
                None => None,
            };
            let mut orchestrator = open_orchestrator(cfg, &honeycomb)?;
            let outcome = orchestrator.dispatch(&worker, task).await;
            let report = WorkerReport {
                worker_type: worker,
                outcome,
            };
            print_json(&report.to_json())?;
            Ok(exit_code_for(std::slice::from_ref(&report)))
        }
        Command::Status => {
            let orchestrator = open_orchestrator(cfg, &honeycomb)?;
            print_json(&serde_json::to_value(orchestrator.health()?)?)?;
            Ok(EXIT_OK)
        }
        Command::Trigger { event, data } => {
            let data = match data {
                Some(raw) => parse_data(&raw)?,
                None => json!({}),
            };
            let mut orchestrator = open_orchestrator(cfg, &honeycomb)?;
            let reports = orchestrator.trigger(&event, data).await;
            if reports.is_empty() {
                warn!(event = %event, "no workers listen to this event");
            }
            let rendered: Vec<Value> = reports.iter().map(WorkerReport::to_json).collect();
            print_json(&Value::Array(rendered))?;
            Ok(exit_code_for(&reports))
        }
        Command::Enqueue {
            worker,
            data,
            max_attempts,
        } => {
            let payload = match data {
                Some(raw) => parse_data(&raw)?,
                None => json!({}),
            };
            let task = Task::new(worker, payload).with_max_attempts(max_attempts);
            let id = open_orchestrator(cfg, &honeycomb)?.enqueue(task)?;
            print_json(&json!({ "task_id": id }))?;
            Ok(EXIT_OK)
        }
    }
}

fn open_orchestrator(cfg: HiveConfig, honeycomb: &Path) -> Result<Orchestrator> {
    let store = HoneycombStore::open(honeycomb)
        .with_context(|| format!("opening honeycomb {}", honeycomb.display()))?;
    Ok(build_orchestrator(cfg, store))
}

/// Registry with the built-in `echo` worker plus one [`CommandWorker`] per
/// `[worker.<type>]` table.
pub fn build_registry(cfg: &HiveConfig) -> WorkerRegistry {
    let mut registry = WorkerRegistry::new();
    registry.register("echo", |_ctx| Box::new(EchoWorker));

    for (worker_type, worker) in cfg.worker.iter() {
        let cmd = worker.cmd.clone();
        registry.register(worker_type.clone(), move |ctx| {
            Box::new(CommandWorker::new(cmd.clone(), ctx))
        });
    }

    debug!(workers = registry.len(), "worker registry built");
    registry
}

/// Composition root: config + store -> orchestrator with all workers wired.
pub fn build_orchestrator(cfg: HiveConfig, store: HoneycombStore) -> Orchestrator {
    let registry = build_registry(&cfg);
    Orchestrator::new(cfg, registry, store)
}

/// Honeycomb directory: CLI override, else `[hive].honeycomb` resolved
/// against the config file's directory.
pub fn resolve_honeycomb(cfg: &HiveConfig, config_path: &Path, cli: Option<&Path>) -> PathBuf {
    if let Some(dir) = cli {
        return dir.to_path_buf();
    }
    let configured = &cfg.hive.honeycomb;
    if configured.is_absolute() {
        configured.clone()
    } else {
        config_root_dir(config_path).join(configured)
    }
}

/// Directory containing the config file, or `.`.
fn config_root_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `EXIT_REJECTED` if any dispatch was refused outright.
pub fn exit_code_for(reports: &[WorkerReport]) -> i32 {
    if reports.iter().any(WorkerReport::is_rejected) {
        EXIT_REJECTED
    } else {
        EXIT_OK
    }
}

fn parse_data(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("invalid --data JSON: {raw}"))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Ctrl-C -> graceful stop; SIGHUP (Unix) -> config reload.
fn spawn_signal_handlers(stop: StopHandle, reload: ReloadHandle) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        info!("Ctrl+C received, stopping after the current iteration");
        stop.stop();
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangups = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGHUP");
                return;
            }
        };
        while hangups.recv().await.is_some() {
            info!("SIGHUP received, config reload requested");
            reload.request();
        }
    });

    #[cfg(not(unix))]
    drop(reload);
}

/// Validated config, as `check` prints it.
fn print_check(cfg: &HiveConfig, honeycomb: &Path) -> Result<()> {
    let schedules: serde_json::Map<String, Value> = cfg
        .schedule
        .iter()
        .map(|(name, entry)| {
            (
                name.clone(),
                json!({ "interval_minutes": entry.interval_minutes, "enabled": entry.enabled }),
            )
        })
        .collect();
    let workers: serde_json::Map<String, Value> = cfg
        .worker
        .iter()
        .map(|(name, worker)| {
            (
                name.clone(),
                json!({
                    "cmd": worker.cmd,
                    "timeout_secs": cfg.worker_timeout(name).as_secs(),
                }),
            )
        })
        .collect();

    print_json(&json!({
        "config": cfg.source().map(|p| p.display().to_string()),
        "honeycomb": honeycomb.display().to_string(),
        "heartbeat_interval_seconds": cfg.hive.heartbeat_interval_seconds,
        "max_failures": cfg.hive.max_failures,
        "drain_batch_size": cfg.hive.drain_batch_size,
        "worker_timeout_secs": cfg.hive.worker_timeout_secs,
        "schedule": schedules,
        "events": cfg.events,
        "workers": workers,
    }))?;

    debug!("check complete (nothing executed)");
    Ok(())
}
