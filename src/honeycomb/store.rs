// src/honeycomb/store.rs

//! Read/modify/write access to the honeycomb directory.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use chrono::Utc;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::errors::{HiveError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::honeycomb::cache::DocumentCache;
use crate::honeycomb::merge::deep_merge;

pub const STATE_DOC: &str = "state";
pub const TASKS_DOC: &str = "tasks";
pub const INTEL_DOC: &str = "intel";

/// Reserved sub-object carrying write provenance.
pub const META_KEY: &str = "_meta";

static DOCUMENT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"));

/// Which alert list an alert is appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Priority,
    Normal,
}

impl AlertLevel {
    fn key(self) -> &'static str {
        match self {
            AlertLevel::Priority => "priority",
            AlertLevel::Normal => "normal",
        }
    }
}

/// Handle to the shared JSON documents.
///
/// Cloning is cheap; clones share the same read cache. There is no file
/// locking: two processes updating the same document race, and the last
/// rename wins for the whole document.
#[derive(Debug, Clone)]
pub struct HoneycombStore {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    cache: Arc<Mutex<DocumentCache>>,
}

impl HoneycombStore {
    /// Open a store on the real filesystem, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let root = root.into();
        fs.create_dir_all(&root)?;
        Ok(Self::with_fs(root, fs))
    }

    /// Build a store over an arbitrary [`FileSystem`] (tests use the mock).
    pub fn with_fs(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            fs,
            cache: Arc::new(Mutex::new(DocumentCache::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk path for a logical document name (`state` -> `state.json`).
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        if !DOCUMENT_NAME.is_match(name) {
            return Err(HiveError::InvalidDocumentName(name.to_string()));
        }
        Ok(self.root.join(format!("{name}.json")))
    }

    /// Read a document.
    ///
    /// A missing, unreadable or malformed file yields the skeleton for that
    /// name; only an invalid name is an error.
    pub fn read(&self, name: &str) -> Result<Value> {
        let path = self.path_of(name)?;

        let Some(stamp) = self.fs.stamp(&path) else {
            debug!(document = name, "document absent; using skeleton");
            return Ok(skeleton(name));
        };

        if let Some(doc) = self.cache().get(name, stamp) {
            return Ok(doc);
        }

        let parsed = self
            .fs
            .read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()));

        match parsed {
            Ok(value @ Value::Object(_)) => {
                let doc = deep_merge(skeleton(name), value);
                self.cache().insert(name, stamp, doc.clone());
                Ok(doc)
            }
            Ok(_) => {
                warn!(document = name, path = ?path, "document is not a JSON object; treating as absent");
                self.cache().invalidate(name);
                Ok(skeleton(name))
            }
            Err(err) => {
                warn!(document = name, path = ?path, error = %err, "unreadable document; treating as absent");
                self.cache().invalidate(name);
                Ok(skeleton(name))
            }
        }
    }

    /// Replace a document entirely, stamping `_meta`.
    ///
    /// Returns the document as written.
    pub fn write(&self, name: &str, mut document: Value, by: &str) -> Result<Value> {
        let path = self.path_of(name)?;
        stamp_meta(name, &mut document, by)?;

        let text = serde_json::to_string_pretty(&document)?;
        if let Err(err) = self.fs.write_atomic(&path, text.as_bytes()) {
            self.cache().invalidate(name);
            return Err(HiveError::Other(err));
        }

        match self.fs.stamp(&path) {
            Some(stamp) => self.cache().insert(name, stamp, document.clone()),
            None => self.cache().invalidate(name),
        }

        debug!(document = name, by, "document written");
        Ok(document)
    }

    /// Deep-merge `partial` into the current document and write it back.
    pub fn update(&self, name: &str, partial: Value, by: &str) -> Result<Value> {
        if !partial.is_object() {
            return Err(HiveError::NotAnObject(name.to_string()));
        }
        let current = self.read(name)?;
        self.write(name, deep_merge(current, partial), by)
    }

    /// Append an alert to `state.alerts.priority` or `state.alerts.normal`.
    pub fn post_alert(&self, message: &str, from: &str, level: AlertLevel) -> Result<()> {
        let mut state = self.read(STATE_DOC)?;
        let alert = json!({
            "message": message,
            "from": from,
            "at": Utc::now().to_rfc3339(),
        });

        let alerts = object_entry(&mut state, "alerts");
        let list = alerts
            .entry(level.key())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !list.is_array() {
            *list = Value::Array(Vec::new());
        }
        if let Value::Array(items) = list {
            items.push(alert);
        }

        self.write(STATE_DOC, state, from)?;
        Ok(())
    }

    /// Deep-merge categorized intel into `intel.json`.
    pub fn update_intel(&self, partial: Value, by: &str) -> Result<Value> {
        self.update(INTEL_DOC, partial, by)
    }

    fn cache(&self) -> MutexGuard<'_, DocumentCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Empty document for a logical name, used on first run and on corruption.
pub fn skeleton(name: &str) -> Value {
    match name {
        STATE_DOC => json!({
            META_KEY: {},
            "alerts": { "priority": [], "normal": [] },
            "scheduler": { "last_runs": {} },
        }),
        TASKS_DOC => json!({
            "pending": [],
            "in_progress": [],
            "completed": [],
            "failed": [],
        }),
        _ => json!({ META_KEY: {} }),
    }
}

fn stamp_meta(name: &str, document: &mut Value, by: &str) -> Result<()> {
    if !document.is_object() {
        return Err(HiveError::NotAnObject(name.to_string()));
    }
    let meta = object_entry(document, META_KEY);
    meta.insert(
        "last_updated".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    meta.insert("last_updated_by".to_string(), Value::String(by.to_string()));
    Ok(())
}

/// Mutable access to `doc[key]` as an object, replacing any non-object value.
///
/// `doc` must itself be an object.
fn object_entry<'a>(doc: &'a mut Value, key: &str) -> &'a mut Map<String, Value> {
    if !doc.is_object() {
        *doc = Value::Object(Map::new());
    }
    let Value::Object(map) = doc else {
        unreachable!("doc was just made an object");
    };
    let slot = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(inner) => inner,
        _ => unreachable!("slot was just made an object"),
    }
}
