#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use queenbee::config::HiveConfig;
use queenbee::engine::Orchestrator;
use queenbee::fs::mock::MockFileSystem;
use queenbee::honeycomb::HoneycombStore;
use queenbee::worker::WorkerRegistry;

pub use queenbee_test_utils::builders;
pub use queenbee_test_utils::fake_workers;
pub use queenbee_test_utils::{init_tracing, with_timeout};

/// Store rooted in a fresh temporary directory (kept alive by the `TempDir`).
pub fn temp_store() -> (TempDir, HoneycombStore) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = HoneycombStore::open(dir.path().join("honeycomb")).expect("open store");
    (dir, store)
}

/// Store backed by the in-memory filesystem.
pub fn mock_store() -> (MockFileSystem, HoneycombStore) {
    let fs = MockFileSystem::new();
    let store = HoneycombStore::with_fs("/hive/honeycomb", Arc::new(fs.clone()));
    (fs, store)
}

/// Orchestrator over a temp-dir honeycomb with the given workers.
pub fn temp_orchestrator(
    config: HiveConfig,
    registry: WorkerRegistry,
) -> (TempDir, Orchestrator) {
    let (dir, store) = temp_store();
    (dir, Orchestrator::new(config, registry, store))
}
