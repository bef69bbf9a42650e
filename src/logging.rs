// src/logging.rs

//! Logging setup for `queenbee` using `tracing` + `tracing-subscriber`.
//!
//! The filter comes from, in order:
//! 1. `--log-level` CLI flag (a plain level for every target)
//! 2. `QUEENBEE_LOG`, as `EnvFilter` directives (e.g. `queenbee=debug,warn`)
//! 3. `RUST_LOG`, same syntax
//! 4. `info`
//!
//! Logs go to STDERR; stdout is reserved for the JSON printed by CLI commands.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "QUEENBEE_LOG";
pub const DEFAULT_DIRECTIVES: &str = "info";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let directives = filter_directives(
        cli_level,
        std::env::var(LOG_ENV).ok().as_deref(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
    );
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter {directives:?}"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

/// Filter directives to install. Blank environment values are ignored.
pub fn filter_directives(
    cli_level: Option<LogLevel>,
    queenbee_log: Option<&str>,
    rust_log: Option<&str>,
) -> String {
    if let Some(level) = cli_level {
        return level_name(level).to_string();
    }
    [queenbee_log, rust_log]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(DEFAULT_DIRECTIVES)
        .to_string()
}

fn level_name(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
