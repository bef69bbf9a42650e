// src/engine/mod.rs

//! The orchestrator proper.
//!
//! - [`breaker`] is the pure failure-counting state machine.
//! - [`orchestrator`] dispatches workers and owns the per-process state.
//! - [`runtime`] drives the heartbeat / schedule / drain loop.

pub mod breaker;
pub mod orchestrator;
pub mod runtime;

/// Public type alias for worker-type names throughout the crate.
pub type WorkerType = String;

pub use breaker::{BreakerState, BreakerTransition, FailurePolicy};
pub use orchestrator::{
    DispatchError, DrainReport, HealthSnapshot, Orchestrator, ScheduleReport, WorkerReport,
};
pub use runtime::{IterationReport, LoopSummary, ReloadHandle, RunMode, Runtime, StopHandle};
