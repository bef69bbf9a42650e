// src/config/validate.rs

use std::sync::LazyLock;

use regex::Regex;

use crate::config::model::{HiveConfig, RawHiveConfig};
use crate::errors::{HiveError, Result};

/// Longest accepted schedule interval: ten years.
pub const MAX_INTERVAL_MINUTES: u64 = 10 * 365 * 24 * 60;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$").expect("static regex"));

impl TryFrom<RawHiveConfig> for HiveConfig {
    type Error = crate::errors::HiveError;

    fn try_from(raw: RawHiveConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(HiveConfig::new_unchecked(raw))
    }
}

pub fn validate_raw_config(cfg: &RawHiveConfig) -> Result<()> {
    validate_hive_section(cfg)?;
    validate_schedules(cfg)?;
    validate_events(cfg)?;
    validate_workers(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> HiveError {
    HiveError::ConfigError(msg.into())
}

fn validate_hive_section(cfg: &RawHiveConfig) -> Result<()> {
    let hive = &cfg.hive;

    if hive.heartbeat_interval_seconds == 0 {
        return Err(config_error(
            "[hive].heartbeat_interval_seconds must be >= 1 (got 0)",
        ));
    }
    if hive.max_failures == 0 {
        return Err(config_error("[hive].max_failures must be >= 1 (got 0)"));
    }
    if hive.drain_batch_size == 0 {
        return Err(config_error("[hive].drain_batch_size must be >= 1 (got 0)"));
    }
    if hive.worker_timeout_secs == 0 {
        return Err(config_error("[hive].worker_timeout_secs must be >= 1 (got 0)"));
    }
    if hive.actor.trim().is_empty() {
        return Err(config_error("[hive].actor must not be empty"));
    }
    if hive.honeycomb.as_os_str().is_empty() {
        return Err(config_error("[hive].honeycomb must not be empty"));
    }
    Ok(())
}

fn validate_schedules(cfg: &RawHiveConfig) -> Result<()> {
    for (name, entry) in cfg.schedule.iter() {
        ensure_identifier("schedule", name)?;
        if entry.interval_minutes == 0 {
            return Err(config_error(format!(
                "schedule '{}' must have interval_minutes >= 1 (got 0)",
                name
            )));
        }
        if entry.interval_minutes > MAX_INTERVAL_MINUTES {
            return Err(config_error(format!(
                "schedule '{}' interval_minutes must be at most {} (got {})",
                name, MAX_INTERVAL_MINUTES, entry.interval_minutes
            )));
        }
    }
    Ok(())
}

fn validate_events(cfg: &RawHiveConfig) -> Result<()> {
    for (event, workers) in cfg.events.iter() {
        ensure_identifier("event", event)?;
        for worker in workers.iter() {
            ensure_identifier("worker", worker).map_err(|_| {
                config_error(format!(
                    "event '{}' lists invalid worker type '{}'",
                    event, worker
                ))
            })?;
        }
    }
    Ok(())
}

fn validate_workers(cfg: &RawHiveConfig) -> Result<()> {
    for (name, worker) in cfg.worker.iter() {
        ensure_identifier("worker", name)?;
        if worker.cmd.trim().is_empty() {
            return Err(config_error(format!("worker '{}' has an empty cmd", name)));
        }
        if worker.timeout_secs == Some(0) {
            return Err(config_error(format!(
                "worker '{}' must have timeout_secs >= 1 (got 0)",
                name
            )));
        }
    }
    Ok(())
}

fn ensure_identifier(kind: &str, name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(config_error(format!(
            "invalid {kind} name '{name}' (allowed: letters, digits, '_', '-', '.')"
        )))
    }
}
