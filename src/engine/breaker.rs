// src/engine/breaker.rs

//! Per-worker-type failure counting and quarantine.
//!
//! Pure state: no IO, no clocks. The orchestrator consults it before every
//! dispatch and feeds it every outcome. Counters live only in memory, so a
//! process restart releases every quarantine.

use std::collections::HashMap;

use tracing::{debug, warn};

pub const DEFAULT_MAX_FAILURES: u32 = 3;

/// Result of recording a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerTransition {
    /// Still below the threshold.
    Counted { failures: u32 },
    /// This failure reached the threshold; the worker type is now quarantined.
    Tripped { failures: u32 },
    /// The worker type was already quarantined (e.g. a late result).
    AlreadyQuarantined { failures: u32 },
}

/// Observable state of one worker type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Healthy { failures: u32 },
    Quarantined { failures: u32 },
}

#[derive(Debug, Clone)]
pub struct FailurePolicy {
    threshold: u32,
    failures: HashMap<String, u32>,
}

impl FailurePolicy {
    /// `threshold` is clamped to at least 1.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            failures: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Change the threshold, keeping the counters. Clamped to at least 1.
    pub fn set_threshold(&mut self, threshold: u32) {
        self.threshold = threshold.max(1);
    }

    pub fn failures(&self, worker_type: &str) -> u32 {
        self.failures.get(worker_type).copied().unwrap_or(0)
    }

    pub fn state(&self, worker_type: &str) -> BreakerState {
        let failures = self.failures(worker_type);
        if failures >= self.threshold {
            BreakerState::Quarantined { failures }
        } else {
            BreakerState::Healthy { failures }
        }
    }

    pub fn is_quarantined(&self, worker_type: &str) -> bool {
        matches!(self.state(worker_type), BreakerState::Quarantined { .. })
    }

    /// `Err(failures)` if dispatch must be refused.
    pub fn check(&self, worker_type: &str) -> Result<(), u32> {
        match self.state(worker_type) {
            BreakerState::Healthy { .. } => Ok(()),
            BreakerState::Quarantined { failures } => Err(failures),
        }
    }

    pub fn record_success(&mut self, worker_type: &str) {
        if let Some(previous) = self.failures.remove(worker_type) {
            debug!(worker_type, previous, "failure counter reset after success");
        }
    }

    pub fn record_failure(&mut self, worker_type: &str) -> BreakerTransition {
        let threshold = self.threshold;
        let counter = self.failures.entry(worker_type.to_string()).or_insert(0);

        if *counter >= threshold {
            *counter += 1;
            return BreakerTransition::AlreadyQuarantined { failures: *counter };
        }

        *counter += 1;
        let failures = *counter;
        if failures >= threshold {
            warn!(worker_type, failures, threshold, "worker type quarantined");
            BreakerTransition::Tripped { failures }
        } else {
            debug!(worker_type, failures, threshold, "worker failure counted");
            BreakerTransition::Counted { failures }
        }
    }

    /// Manual release from quarantine. Returns whether it was quarantined.
    pub fn reset(&mut self, worker_type: &str) -> bool {
        let was = self.is_quarantined(worker_type);
        self.failures.remove(worker_type);
        was
    }

    /// Quarantined worker types, sorted.
    pub fn quarantined(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .failures
            .iter()
            .filter(|(_, n)| **n >= self.threshold)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAILURES)
    }
}
