//! Persistent write-once response cache.
//!
//! The whole cache is a single JSON object held in memory. It is loaded once
//! when the [`CacheStore`] is opened and written back in full after every
//! insert, so the backing document always mirrors memory after a successful
//! [`put`](CacheStore::put).
//!
//! # Key space
//!
//! | Key | Value |
//! |-----|-------|
//! | `2021-06-05` | chart snapshot payload for that date |
//! | `butter bts` | raw search response for a normalized query |
//! | `features:<id>` | raw audio-feature record for a track id |
//!
//! Backing storage is pluggable through [`CacheBackend`] so tests can run
//! against [`MemoryBackend`] instead of the filesystem.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Prefix for audio-feature records, keeping ids apart from queries and dates.
pub const FEATURES_PREFIX: &str = "features:";

pub fn features_key(track_id: &str) -> String {
    format!("{}{}", FEATURES_PREFIX, track_id)
}

/// Where the serialized cache document lives.
pub trait CacheBackend: Send + Sync {
    /// Read the stored document. `Ok(None)` means nothing has been stored yet.
    fn load(&self) -> Result<Option<String>>;

    /// Replace the stored document.
    fn save(&self, document: &str) -> Result<()>;
}

/// Cache document stored as a JSON file on disk.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CacheBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read cache file: {}", self.path.display())),
        }
    }

    fn save(&self, document: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // Write beside the target and rename so a crash never leaves half a document.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, document)
            .with_context(|| format!("Failed to write cache file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace cache file: {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory backend. Clones share the same document, so a test can reopen
/// a [`CacheStore`] over the "same file".
#[derive(Clone, Default)]
pub struct MemoryBackend {
    document: Arc<Mutex<Option<String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: &str) -> Self {
        Self {
            document: Arc::new(Mutex::new(Some(document.to_string()))),
        }
    }

    pub fn document(&self) -> Option<String> {
        self.document.lock().ok().and_then(|d| d.clone())
    }
}

impl CacheBackend for MemoryBackend {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.document())
    }

    fn save(&self, document: &str) -> Result<()> {
        let mut guard = self
            .document
            .lock()
            .map_err(|_| anyhow::anyhow!("memory cache backend lock poisoned"))?;
        *guard = Some(document.to_string());
        Ok(())
    }
}

/// Key → raw JSON response map with write-once semantics.
pub struct CacheStore {
    entries: Map<String, Value>,
    backend: Box<dyn CacheBackend>,
}

impl CacheStore {
    /// Load the cache from `backend`. Any failure to read or parse the stored
    /// document starts an empty cache instead.
    pub fn open(backend: Box<dyn CacheBackend>) -> Self {
        let entries = match backend.load() {
            Ok(Some(doc)) => match serde_json::from_str::<Value>(&doc) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    warn!("cache document is not a JSON object; starting empty");
                    Map::new()
                }
                Err(e) => {
                    warn!("discarding malformed cache document: {}", e);
                    Map::new()
                }
            },
            Ok(None) => Map::new(),
            Err(e) => {
                warn!("could not read cache: {:#}", e);
                Map::new()
            }
        };
        debug!(entries = entries.len(), "cache loaded");
        Self { entries, backend }
    }

    /// Open the JSON file cache at `path`.
    pub fn open_file(path: impl Into<PathBuf>) -> Self {
        Self::open(Box::new(JsonFileBackend::new(path)))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert `value` under `key` and persist the whole document.
    ///
    /// The first write for a key wins: if `key` is already present nothing
    /// changes and `Ok(false)` is returned. If persisting fails the entry is
    /// rolled back so memory never runs ahead of the backing store.
    pub fn put(&mut self, key: &str, value: Value) -> Result<bool> {
        if self.entries.contains_key(key) {
            debug!(key, "cache key already populated; keeping first value");
            return Ok(false);
        }
        self.entries.insert(key.to_string(), value);
        if let Err(e) = self.flush() {
            self.entries.remove(key);
            return Err(e);
        }
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    fn flush(&self) -> Result<()> {
        let document = serde_json::to_string(&self.entries)?;
        self.backend.save(&document)
    }
}
