// src/config/mod.rs

//! Configuration loading and validation for queenbee.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate invariants like positive intervals (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{HiveConfig, HiveSection, RawHiveConfig, ScheduleEntry, WorkerConfig};
pub use validate::{validate_raw_config, MAX_INTERVAL_MINUTES};
