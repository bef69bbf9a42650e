// tests/command_worker.rs
#![cfg(unix)]

mod common;
use crate::common::builders::HiveConfigBuilder;
use crate::common::{init_tracing, temp_orchestrator, with_timeout};

use std::error::Error;

use serde_json::json;

use queenbee::build_registry;
use queenbee::tasks::{Task, TaskStatus};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn stdout_json_becomes_the_result() -> TestResult {
    init_tracing();
    let cfg = HiveConfigBuilder::new()
        .with_command_worker("scout", r#"echo '{"trends": ["lofi"]}'"#)
        .build();
    let registry = build_registry(&cfg);
    let (_dir, mut orch) = temp_orchestrator(cfg, registry);

    let envelope = with_timeout(orch.dispatch("scout", None)).await?;
    assert!(envelope.success, "error: {:?}", envelope.error);
    assert_eq!(envelope.result, json!({ "trends": ["lofi"] }));
    Ok(())
}

#[tokio::test]
async fn task_arrives_on_stdin_and_env_is_exported() -> TestResult {
    init_tracing();
    let cfg = HiveConfigBuilder::new()
        .with_command_worker("relay", r#"cat; printf ' %s' "$QUEENBEE_WORKER_TYPE""#)
        .build();
    let registry = build_registry(&cfg);
    let (_dir, mut orch) = temp_orchestrator(cfg, registry);

    let task = Task::for_event("relay", "donation", json!({ "amount": 5 }));
    let envelope = with_timeout(orch.dispatch("relay", Some(task))).await?;
    assert!(envelope.success, "error: {:?}", envelope.error);

    // stdout is "<task json> relay", which is not JSON, so it comes back as text.
    let text = envelope.result.as_str().expect("text result");
    assert!(text.contains(r#""triggered_by":"donation""#), "got {text}");
    assert!(text.ends_with(" relay"), "got {text}");
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_fails_with_stderr_tail() -> TestResult {
    init_tracing();
    let cfg = HiveConfigBuilder::new()
        .with_command_worker("broken", "echo 'quota exceeded' >&2; exit 3")
        .build();
    let registry = build_registry(&cfg);
    let (_dir, mut orch) = temp_orchestrator(cfg, registry);

    let envelope = with_timeout(orch.dispatch("broken", None)).await?;
    assert!(!envelope.success);
    let error = envelope.error.unwrap_or_default();
    assert!(error.contains("code 3"), "got {error}");
    assert!(error.contains("quota exceeded"), "got {error}");
    Ok(())
}

#[tokio::test]
async fn slow_process_is_killed_at_timeout() -> TestResult {
    init_tracing();
    let cfg = HiveConfigBuilder::new()
        .with_command_worker("sleeper", "sleep 30")
        .worker_timeout_secs(1)
        .build();
    let registry = build_registry(&cfg);
    let (_dir, mut orch) = temp_orchestrator(cfg, registry);

    let envelope = with_timeout(orch.dispatch("sleeper", None)).await?;
    assert!(!envelope.success);
    assert!(envelope.error.unwrap_or_default().contains("timed out"));
    Ok(())
}

#[tokio::test]
async fn queued_task_round_trips_through_a_process() -> TestResult {
    init_tracing();
    let cfg = HiveConfigBuilder::new()
        .with_command_worker("noop", "cat >/dev/null; echo 42")
        .build();
    let registry = build_registry(&cfg);
    let (_dir, mut orch) = temp_orchestrator(cfg, registry);

    let id = orch.enqueue(Task::new("noop", json!({})))?;
    let report = with_timeout(orch.process_task_queue()).await?;
    assert_eq!(report.completed, 1);

    let task = orch.queue().find(&id)?.expect("task");
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result, Some(json!(42)));
    Ok(())
}
