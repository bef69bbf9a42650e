// tests/orchestrator.rs

mod common;
use crate::common::builders::HiveConfigBuilder;
use crate::common::fake_workers::{register_always_fails, register_scripted, Script};
use crate::common::{init_tracing, temp_orchestrator, with_timeout};

use std::error::Error;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use queenbee::engine::DispatchError;
use queenbee::honeycomb::STATE_DOC;
use queenbee::tasks::{Task, TaskStatus};
use queenbee::worker::{EchoWorker, WorkerRegistry};
use queenbee::{build_registry, exit_code_for, EXIT_OK, EXIT_REJECTED};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn dispatch_wraps_result_in_envelope() -> TestResult {
    init_tracing();
    let mut registry = WorkerRegistry::new();
    let calls = register_scripted(&mut registry, "trend_scout", Script::Succeed(json!({ "trends": 3 })));
    let (_dir, mut orch) = temp_orchestrator(HiveConfigBuilder::new().build(), registry);

    let envelope = orch.dispatch("trend_scout", None).await?;

    assert!(envelope.success);
    assert_eq!(envelope.result, json!({ "trends": 3 }));
    assert!(envelope.error.is_none());
    assert!(envelope.duration_seconds >= 0.0);
    assert!(envelope.worker_id.starts_with("trend_scout_"));
    assert_eq!(envelope.worker_id.len(), "trend_scout_".len() + 8);
    assert_eq!(calls.count(), 1);
    assert_eq!(calls.tasks(), vec![None]);
    Ok(())
}

#[tokio::test]
async fn unknown_worker_is_rejected() {
    init_tracing();
    let (_dir, mut orch) = temp_orchestrator(HiveConfigBuilder::new().build(), WorkerRegistry::new());

    let err = orch.dispatch("ghost", None).await.unwrap_err();
    assert_eq!(err, DispatchError::UnknownWorker("ghost".to_string()));
    assert_eq!(err.code(), "unknown_worker");
    assert!(orch.breaker().quarantined().is_empty());
}

#[tokio::test]
async fn worker_errors_panics_and_timeouts_become_failed_envelopes() -> TestResult {
    init_tracing();
    let mut registry = WorkerRegistry::new();
    register_scripted(&mut registry, "failing", Script::Fail("api down".into()));
    register_scripted(&mut registry, "panicking", Script::Panic("boom".into()));
    register_scripted(&mut registry, "sleepy", Script::Sleep(Duration::from_secs(30)));
    let cfg = HiveConfigBuilder::new().worker_timeout_secs(1).build();
    let (_dir, mut orch) = temp_orchestrator(cfg, registry);

    let failed = orch.dispatch("failing", None).await?;
    assert!(!failed.success);
    assert!(failed.error.as_deref().unwrap_or_default().contains("api down"));

    let panicked = orch.dispatch("panicking", None).await?;
    assert!(!panicked.success);
    assert!(panicked.error.as_deref().unwrap_or_default().contains("boom"));

    let timed_out = with_timeout(orch.dispatch("sleepy", None)).await?;
    assert!(!timed_out.success);
    assert!(timed_out.error.as_deref().unwrap_or_default().contains("timed out"));
    assert!(timed_out.duration_seconds < 10.0);
    Ok(())
}

#[tokio::test]
async fn always_failing_worker_is_quarantined_after_three_failures() -> TestResult {
    init_tracing();
    let mut registry = WorkerRegistry::new();
    let calls = register_always_fails(&mut registry, "always_fails");
    let (_dir, mut orch) = temp_orchestrator(HiveConfigBuilder::new().build(), registry);

    for _ in 0..3 {
        let envelope = orch.dispatch("always_fails", None).await?;
        assert!(!envelope.success);
    }

    let fourth = orch.dispatch("always_fails", None).await;
    assert!(matches!(
        fourth,
        Err(DispatchError::Quarantined { ref worker_type, failures: 3 }) if worker_type == "always_fails"
    ));
    assert_eq!(fourth.unwrap_err().code(), "quarantined");
    assert_eq!(calls.count(), 3, "quarantined worker must not be invoked");

    let state = orch.store().read(STATE_DOC)?;
    let alerts = state["alerts"]["priority"].as_array().expect("priority alerts");
    assert_eq!(alerts.len(), 1, "exactly one alert on the trip");
    assert!(alerts[0]["message"].as_str().unwrap().contains("always_fails"));

    assert!(orch.reset_quarantine("always_fails"));
    assert!(orch.dispatch("always_fails", None).await.is_ok());
    assert_eq!(calls.count(), 4);
    Ok(())
}

#[tokio::test]
async fn success_resets_the_failure_count_of_the_same_worker() -> TestResult {
    init_tracing();
    let fail = || Script::Fail("api down".into());
    let mut registry = WorkerRegistry::new();
    let calls = register_scripted(
        &mut registry,
        "flaky",
        Script::Sequence(vec![fail(), fail(), Script::Succeed(json!("ok")), fail()]),
    );
    let (_dir, mut orch) = temp_orchestrator(HiveConfigBuilder::new().build(), registry);

    assert!(!orch.dispatch("flaky", None).await?.success);
    assert!(!orch.dispatch("flaky", None).await?.success);
    assert_eq!(orch.breaker().failures("flaky"), 2);

    assert!(orch.dispatch("flaky", None).await?.success);
    assert_eq!(orch.breaker().failures("flaky"), 0);

    // Three more consecutive failures are needed to trip again.
    for expected in 1..=3 {
        assert!(!orch.dispatch("flaky", None).await?.success);
        assert_eq!(orch.breaker().failures("flaky"), expected);
    }
    assert!(matches!(
        orch.dispatch("flaky", None).await,
        Err(DispatchError::Quarantined { failures: 3, .. })
    ));
    assert_eq!(calls.count(), 6);
    Ok(())
}

#[tokio::test]
async fn other_worker_success_does_not_reset_counts() -> TestResult {
    init_tracing();
    let mut registry = WorkerRegistry::new();
    register_always_fails(&mut registry, "flaky");
    register_scripted(&mut registry, "steady", Script::Succeed(json!(null)));
    let (_dir, mut orch) = temp_orchestrator(HiveConfigBuilder::new().build(), registry);

    orch.dispatch("flaky", None).await?;
    orch.dispatch("flaky", None).await?;
    orch.dispatch("steady", None).await?;
    assert_eq!(orch.breaker().failures("flaky"), 2);
    assert_eq!(orch.breaker().failures("steady"), 0);

    orch.dispatch("flaky", None).await?;
    assert!(orch.breaker().is_quarantined("flaky"));
    Ok(())
}

#[tokio::test]
async fn trigger_dispatches_mapped_workers_in_order() -> TestResult {
    init_tracing();
    let mut registry = WorkerRegistry::new();
    let engagement = register_scripted(&mut registry, "engagement", Script::Succeed(json!("thanked")));
    let poster = register_scripted(&mut registry, "social_poster", Script::Succeed(json!("posted")));
    let cfg = HiveConfigBuilder::new()
        .with_event("donation", &["engagement", "social_poster", "ghost"])
        .build();
    let (_dir, mut orch) = temp_orchestrator(cfg, registry);

    let reports = orch.trigger("donation", json!({ "amount": 5 })).await;

    let order: Vec<&str> = reports.iter().map(|r| r.worker_type.as_str()).collect();
    assert_eq!(order, vec!["engagement", "social_poster", "ghost"]);
    assert!(reports[0].ran_successfully());
    assert!(reports[1].ran_successfully());
    assert!(reports[2].is_rejected());
    assert_eq!(exit_code_for(&reports), EXIT_REJECTED);
    assert_eq!(exit_code_for(&reports[..2]), EXIT_OK);

    let task = engagement.tasks()[0].clone().expect("event task");
    assert_eq!(task.triggered_by.as_deref(), Some("donation"));
    assert_eq!(task.payload, json!({ "amount": 5 }));
    assert_eq!(poster.count(), 1);

    assert!(orch.trigger("eclipse", json!({})).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn run_schedule_dispatches_due_workers_and_persists_last_runs() -> TestResult {
    init_tracing();
    let mut registry = WorkerRegistry::new();
    let scout = register_scripted(&mut registry, "trend_scout", Script::Succeed(json!(null)));
    let intel = register_scripted(&mut registry, "listener_intel", Script::Succeed(json!(null)));
    let cfg = HiveConfigBuilder::new()
        .with_schedule("trend_scout", 60)
        .with_schedule("listener_intel", 60)
        .build();
    let (_dir, mut orch) = temp_orchestrator(cfg, registry);

    let now = Utc::now();
    orch.store().update(
        STATE_DOC,
        json!({ "scheduler": { "last_runs": {
            "trend_scout": (now - chrono::Duration::minutes(61)).to_rfc3339(),
            "listener_intel": (now - chrono::Duration::minutes(10)).to_rfc3339(),
        }}}),
        "test",
    )?;

    let report = orch.run_schedule().await?;
    assert_eq!(report.dispatched.len(), 1);
    assert_eq!(report.dispatched[0].worker_type, "trend_scout");
    assert_eq!((scout.count(), intel.count()), (1, 0));

    let state = orch.store().read(STATE_DOC)?;
    let stamped = state["scheduler"]["last_runs"]["trend_scout"]
        .as_str()
        .expect("last run recorded");
    let stamped = chrono::DateTime::parse_from_rfc3339(stamped)?;
    assert!(stamped.with_timezone(&Utc) >= now);
    assert!(state["scheduler"]["last_schedule_check"].is_string());

    // Second tick right away: nothing is due.
    let report = orch.run_schedule().await?;
    assert!(report.dispatched.is_empty());
    assert_eq!(scout.count(), 1);
    Ok(())
}

#[tokio::test]
async fn queue_drain_completes_echo_tasks() -> TestResult {
    init_tracing();
    let cfg = HiveConfigBuilder::new().build();
    let registry = build_registry(&cfg);
    let (_dir, mut orch) = temp_orchestrator(cfg, registry);

    let id = orch.enqueue(Task::new("echo", json!({ "hello": "hive" })))?;
    let report = orch.process_task_queue().await?;
    assert_eq!(report.completed, 1);

    let task = orch.queue().find(&id)?.expect("task exists");
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.attempts, 1);
    assert_eq!(task.result.expect("result")["payload"], json!({ "hello": "hive" }));
    Ok(())
}

#[tokio::test]
async fn queue_drain_retries_then_fails_and_dead_letters_unknown() -> TestResult {
    init_tracing();
    let mut registry = WorkerRegistry::new();
    register_always_fails(&mut registry, "broken");
    let cfg = HiveConfigBuilder::new().max_failures(10).build();
    let (_dir, mut orch) = temp_orchestrator(cfg, registry);

    let broken = orch.enqueue(Task::new("broken", json!({})).with_max_attempts(2))?;
    let ghost = orch.enqueue(Task::new("ghost", json!({})))?;

    let first = orch.process_task_queue().await?;
    assert_eq!((first.retried, first.failed), (1, 1));
    assert_eq!(
        orch.queue().find(&ghost)?.expect("ghost").status,
        TaskStatus::Failed
    );

    let second = orch.process_task_queue().await?;
    assert_eq!(second.failed, 1);
    let task = orch.queue().find(&broken)?.expect("broken");
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.attempts, 2);
    assert!(task.last_error.as_deref().unwrap_or_default().contains("always fails"));
    Ok(())
}

#[tokio::test]
async fn queue_drain_leaves_quarantined_and_untyped_tasks_pending() -> TestResult {
    init_tracing();
    let mut registry = WorkerRegistry::new();
    let calls = register_always_fails(&mut registry, "broken");
    let cfg = HiveConfigBuilder::new().max_failures(1).build();
    let (_dir, mut orch) = temp_orchestrator(cfg, registry);

    orch.dispatch("broken", None).await?;
    assert!(orch.breaker().is_quarantined("broken"));

    let queued = orch.enqueue(Task::new("broken", json!({})))?;
    let mut untyped = Task::new("x", json!({}));
    untyped.bee_type = None;
    let untyped = orch.enqueue(untyped)?;

    let report = orch.process_task_queue().await?;
    assert_eq!(report.examined, 0);
    assert_eq!(calls.count(), 1);

    for id in [queued, untyped] {
        let task = orch.queue().find(&id)?.expect("task");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.attempts, 0);
    }
    Ok(())
}

#[tokio::test]
async fn drain_batch_size_bounds_each_pass() -> TestResult {
    init_tracing();
    let mut registry = WorkerRegistry::new();
    registry.register("echo", |_ctx| Box::new(EchoWorker));
    let cfg = HiveConfigBuilder::new().drain_batch_size(2).build();
    let (_dir, mut orch) = temp_orchestrator(cfg, registry);

    for n in 0..5 {
        orch.enqueue(Task::new("echo", json!({ "n": n })))?;
    }

    assert_eq!(orch.process_task_queue().await?.completed, 2);
    assert_eq!(orch.queue().counts()?.pending, 3);
    Ok(())
}

#[tokio::test]
async fn heartbeat_records_liveness_and_reports_health() -> TestResult {
    init_tracing();
    let mut registry = WorkerRegistry::new();
    register_always_fails(&mut registry, "broken");
    let cfg = HiveConfigBuilder::new().max_failures(1).build();
    let (_dir, mut orch) = temp_orchestrator(cfg, registry);

    orch.store()
        .update(STATE_DOC, json!({ "broadcast": { "status": "live" } }), "stream")?;
    orch.dispatch("broken", None).await?;
    orch.enqueue(Task::new("broken", json!({})))?;

    let health = orch.heartbeat()?;
    assert_eq!(health.status, "alive");
    assert_eq!(health.broadcast_status, "live");
    assert_eq!(health.tasks.pending, 1);
    assert_eq!(health.alerts_pending, 1);
    assert_eq!(health.quarantined_workers, vec!["broken".to_string()]);
    assert_eq!(health.registered_workers, vec!["broken".to_string()]);
    assert!(health.last_heartbeat.is_some());

    let state = orch.store().read(STATE_DOC)?;
    assert_eq!(state["queen"]["status"], json!("alive"));
    Ok(())
}

#[tokio::test]
async fn independent_orchestrators_do_not_share_failure_counts() -> TestResult {
    init_tracing();
    let mut first_registry = WorkerRegistry::new();
    register_always_fails(&mut first_registry, "broken");
    let mut second_registry = WorkerRegistry::new();
    register_always_fails(&mut second_registry, "broken");

    let cfg = HiveConfigBuilder::new().max_failures(1).build();
    let (_a, mut first) = temp_orchestrator(cfg.clone(), first_registry);
    let (_b, mut second) = temp_orchestrator(cfg, second_registry);

    first.dispatch("broken", None).await?;
    assert!(first.breaker().is_quarantined("broken"));
    assert!(!second.breaker().is_quarantined("broken"));
    assert!(second.dispatch("broken", None).await.is_ok());
    Ok(())
}
