// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::tasks::DEFAULT_MAX_ATTEMPTS;

/// Command-line arguments for `queenbee`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "queenbee",
    version,
    about = "Orchestrate a hive of workers over shared JSON documents.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `QUEENBEE_CONFIG`, else `Hive.toml` in the current working
    /// directory. A missing file means built-in defaults.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Honeycomb directory, overriding `[hive].honeycomb`.
    #[arg(long, global = true, value_name = "DIR")]
    pub honeycomb: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `QUEENBEE_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the main loop until interrupted (Ctrl-C).
    Run,

    /// Run a single loop iteration and exit.
    Once,

    /// Dispatch one worker right now.
    Spawn {
        /// Worker type to run.
        #[arg(long, value_name = "TYPE")]
        worker: String,

        /// Task payload as JSON. Without it the worker runs with no task.
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
    },

    /// Print a health snapshot without writing anything.
    Status,

    /// Fire an event, waking every worker mapped to it.
    Trigger {
        #[arg(long, value_name = "NAME")]
        event: String,

        /// Event data as JSON (default `{}`).
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
    },

    /// Append a task to the queue for a later drain.
    Enqueue {
        #[arg(long, value_name = "TYPE")]
        worker: String,

        /// Task payload as JSON (default `{}`).
        #[arg(long, value_name = "JSON")]
        data: Option<String>,

        #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u32,
    },

    /// Parse and validate the config, print it, and exit.
    Check,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
