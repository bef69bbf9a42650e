// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::breaker::DEFAULT_MAX_FAILURES;

/// Configuration exactly as deserialized from TOML.
///
/// ```toml
/// [hive]
/// honeycomb = "honeycomb"
/// heartbeat_interval_seconds = 60
/// max_failures = 3
///
/// [schedule.trend_scout]
/// interval_minutes = 60
///
/// [events]
/// donation = ["engagement", "social_poster"]
///
/// [worker.trend_scout]
/// cmd = "python3 bees/trend_scout.py"
/// ```
///
/// All sections are optional. Use [`HiveConfig`] (via `TryFrom`) for a
/// validated view.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawHiveConfig {
    #[serde(default)]
    pub hive: HiveSection,

    /// `[schedule.<worker_type>]` tables.
    #[serde(default)]
    pub schedule: BTreeMap<String, ScheduleEntry>,

    /// `[events]`: event name -> worker types to wake.
    #[serde(default)]
    pub events: BTreeMap<String, Vec<String>>,

    /// `[worker.<worker_type>]`: process-backed workers.
    #[serde(default)]
    pub worker: BTreeMap<String, WorkerConfig>,
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawHiveConfig>` (or
/// [`HiveConfig::default`]), so holders can rely on the invariants checked in
/// `validate.rs`.
#[derive(Debug, Clone, Default)]
pub struct HiveConfig {
    pub hive: HiveSection,
    pub schedule: BTreeMap<String, ScheduleEntry>,
    pub events: BTreeMap<String, Vec<String>>,
    pub worker: BTreeMap<String, WorkerConfig>,

    /// File this config was loaded from, if any.
    source: Option<PathBuf>,
}

impl HiveConfig {
    pub(crate) fn new_unchecked(raw: RawHiveConfig) -> Self {
        Self {
            hive: raw.hive,
            schedule: raw.schedule,
            events: raw.events,
            worker: raw.worker,
            source: None,
        }
    }

    pub(crate) fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Re-read the file this config came from.
    ///
    /// A config built in memory (no source) reloads as an unchanged copy.
    pub fn reload(&self) -> crate::errors::Result<HiveConfig> {
        match &self.source {
            Some(path) => crate::config::loader::load_or_default(path),
            None => Ok(self.clone()),
        }
    }

    /// Timeout for one dispatch of `worker_type`.
    pub fn worker_timeout(&self, worker_type: &str) -> Duration {
        let secs = self
            .worker
            .get(worker_type)
            .and_then(|w| w.timeout_secs)
            .unwrap_or(self.hive.worker_timeout_secs);
        Duration::from_secs(secs)
    }
}

/// `[hive]` section: orchestrator-wide knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HiveSection {
    /// Directory holding the shared JSON documents. Relative paths are
    /// resolved against the config file's directory.
    #[serde(default = "default_honeycomb")]
    pub honeycomb: PathBuf,

    /// Identity stamped into `_meta.last_updated_by` for orchestrator writes.
    #[serde(default = "default_actor")]
    pub actor: String,

    /// Sleep between main-loop iterations.
    #[serde(default = "default_heartbeat_interval_seconds")]
    pub heartbeat_interval_seconds: u64,

    /// Pause after a failed iteration before trying again.
    #[serde(default = "default_error_pause_seconds")]
    pub error_pause_seconds: u64,

    /// Consecutive failures before a worker type is quarantined.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Pending tasks dispatched per loop iteration.
    #[serde(default = "default_drain_batch_size")]
    pub drain_batch_size: usize,

    /// Upper bound on one `work` call unless a worker overrides it.
    #[serde(default = "default_worker_timeout_secs")]
    pub worker_timeout_secs: u64,
}

fn default_honeycomb() -> PathBuf {
    PathBuf::from("honeycomb")
}

fn default_actor() -> String {
    "queen".to_string()
}

fn default_heartbeat_interval_seconds() -> u64 {
    60
}

fn default_error_pause_seconds() -> u64 {
    5
}

fn default_max_failures() -> u32 {
    DEFAULT_MAX_FAILURES
}

fn default_drain_batch_size() -> usize {
    5
}

fn default_worker_timeout_secs() -> u64 {
    300
}

impl Default for HiveSection {
    fn default() -> Self {
        Self {
            honeycomb: default_honeycomb(),
            actor: default_actor(),
            heartbeat_interval_seconds: default_heartbeat_interval_seconds(),
            error_pause_seconds: default_error_pause_seconds(),
            max_failures: default_max_failures(),
            drain_batch_size: default_drain_batch_size(),
            worker_timeout_secs: default_worker_timeout_secs(),
        }
    }
}

/// `[schedule.<worker_type>]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleEntry {
    pub interval_minutes: u64,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ScheduleEntry {
    pub fn every(interval_minutes: u64) -> Self {
        Self {
            interval_minutes,
            enabled: true,
        }
    }
}

/// `[worker.<worker_type>]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Shell command; receives the task as JSON on stdin.
    pub cmd: String,

    /// Per-worker override of `hive.worker_timeout_secs`.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}
