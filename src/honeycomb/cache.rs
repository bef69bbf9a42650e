// src/honeycomb/cache.rs

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::fs::FileStamp;

#[derive(Debug, Clone)]
struct CacheEntry {
    stamp: FileStamp,
    document: Value,
}

/// In-memory cache of parsed honeycomb documents.
///
/// An entry is only valid while the file's on-disk stamp matches the stamp
/// recorded when it was cached. Callers always receive clones.
#[derive(Debug, Default)]
pub struct DocumentCache {
    entries: HashMap<String, CacheEntry>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Cached copy of `name` if it was recorded at exactly `stamp`.
    pub fn get(&self, name: &str, stamp: FileStamp) -> Option<Value> {
        match self.entries.get(name) {
            Some(entry) if entry.stamp == stamp => Some(entry.document.clone()),
            Some(_) => {
                debug!(document = name, "cache stale: on-disk stamp changed");
                None
            }
            None => None,
        }
    }

    pub fn insert(&mut self, name: &str, stamp: FileStamp, document: Value) {
        self.entries
            .insert(name.to_string(), CacheEntry { stamp, document });
    }

    pub fn invalidate(&mut self, name: &str) {
        if self.entries.remove(name).is_some() {
            debug!(document = name, "invalidated cached document");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
