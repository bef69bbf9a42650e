// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::model::{HiveConfig, RawHiveConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawHiveConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawHiveConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawHiveConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<HiveConfig> {
    let raw_config = load_from_path(&path)?;
    let config = HiveConfig::try_from(raw_config)?;
    Ok(config.with_source(path.as_ref()))
}

/// Like [`load_and_validate`], but a missing file yields the defaults.
///
/// A file that exists but does not parse or validate is still an error: the
/// hive refuses to start on a broken config rather than silently running
/// with defaults.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<HiveConfig> {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = ?path, "no config file; using defaults");
        return Ok(HiveConfig::default().with_source(path));
    }
    load_and_validate(path)
}

/// Default config location: `Hive.toml` in the working directory, unless
/// `QUEENBEE_CONFIG` points elsewhere.
pub fn default_config_path() -> PathBuf {
    std::env::var_os("QUEENBEE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("Hive.toml"))
}
