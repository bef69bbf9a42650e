// src/fs/mock.rs

use super::{FileStamp, FileSystem};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

#[derive(Debug, Clone)]
struct MockFile {
    contents: Vec<u8>,
    version: u64,
}

/// In-memory filesystem for store tests.
///
/// Every write bumps a global version counter which doubles as the file's
/// modification time, so stamps change on every write regardless of clock
/// resolution.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockFile>>>,
    clock: Arc<AtomicU64>,
    fail_writes: Arc<AtomicBool>,
    reads: Arc<AtomicU64>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a file in place, as another process would.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let version = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        let mut files = self.files.lock().unwrap();
        files.insert(
            path.as_ref().to_path_buf(),
            MockFile {
                contents: content.into(),
                version,
            },
        );
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        let files = self.files.lock().unwrap();
        files
            .get(path.as_ref())
            .map(|f| String::from_utf8_lossy(&f.contents).into_owned())
    }

    /// Make every subsequent write fail (disk full, permission denied...).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `read_to_string` calls served so far.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let files = self.files.lock().unwrap();
        match files.get(path) {
            Some(file) => String::from_utf8(file.contents.clone())
                .map_err(|e| anyhow!("Invalid UTF-8: {}", e)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("write refused by mock filesystem: {:?}", path));
        }
        self.add_file(path, contents);
        Ok(())
    }

    fn stamp(&self, path: &Path) -> Option<FileStamp> {
        let files = self.files.lock().unwrap();
        files.get(path).map(|f| FileStamp {
            modified: Some(UNIX_EPOCH + Duration::from_nanos(f.version)),
            len: f.contents.len() as u64,
        })
    }

    fn create_dir_all(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}
