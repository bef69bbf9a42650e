#![allow(dead_code)]

use queenbee::config::{HiveConfig, RawHiveConfig, ScheduleEntry, WorkerConfig};

/// Builder for `HiveConfig` to simplify test setup.
///
/// Starts from the built-in defaults with an empty schedule and event table.
pub struct HiveConfigBuilder {
    config: RawHiveConfig,
}

impl HiveConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawHiveConfig::default(),
        }
    }

    pub fn with_schedule(mut self, worker_type: &str, interval_minutes: u64) -> Self {
        self.config
            .schedule
            .insert(worker_type.to_string(), ScheduleEntry::every(interval_minutes));
        self
    }

    pub fn with_disabled_schedule(mut self, worker_type: &str, interval_minutes: u64) -> Self {
        self.config.schedule.insert(
            worker_type.to_string(),
            ScheduleEntry {
                interval_minutes,
                enabled: false,
            },
        );
        self
    }

    pub fn with_event(mut self, event: &str, worker_types: &[&str]) -> Self {
        self.config.events.insert(
            event.to_string(),
            worker_types.iter().map(|w| w.to_string()).collect(),
        );
        self
    }

    pub fn with_command_worker(mut self, worker_type: &str, cmd: &str) -> Self {
        self.config.worker.insert(
            worker_type.to_string(),
            WorkerConfig {
                cmd: cmd.to_string(),
                timeout_secs: None,
            },
        );
        self
    }

    pub fn max_failures(mut self, n: u32) -> Self {
        self.config.hive.max_failures = n;
        self
    }

    pub fn drain_batch_size(mut self, n: usize) -> Self {
        self.config.hive.drain_batch_size = n;
        self
    }

    pub fn worker_timeout_secs(mut self, secs: u64) -> Self {
        self.config.hive.worker_timeout_secs = secs;
        self
    }

    pub fn heartbeat_interval_seconds(mut self, secs: u64) -> Self {
        self.config.hive.heartbeat_interval_seconds = secs;
        self
    }

    pub fn error_pause_seconds(mut self, secs: u64) -> Self {
        self.config.hive.error_pause_seconds = secs;
        self
    }

    pub fn build(self) -> HiveConfig {
        HiveConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for HiveConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
