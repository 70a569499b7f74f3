//! Bounded local store for flush payloads.
//!
//! The store keeps the last [`MAX_STORED_FLUSHES`] payloads as a single JSON
//! array under a well-known key. For [`FileStore`] the key is the file name:
//!
//! ```text
//! <data_dir>/
//! └── ledgerwatch_telemetry.json   [ {timestamp, spans, metrics, logs, resource}, ... ]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StoreError;

use super::payload::FlushPayload;

/// Well-known key the payload array is stored under.
pub const STORAGE_KEY: &str = "ledgerwatch_telemetry";

/// Ring buffer capacity. Appending beyond it evicts the oldest payload.
pub const MAX_STORED_FLUSHES: usize = 100;

/// Sink for flushed payloads.
///
/// Implementations are called off the buffer's lock, from whichever thread
/// triggered the flush.
pub trait PayloadStore: Send + Sync {
    /// Append one payload, evicting the oldest beyond [`MAX_STORED_FLUSHES`].
    fn append(&self, payload: &FlushPayload) -> Result<(), StoreError>;

    /// All stored payloads, oldest first.
    fn load(&self) -> Result<Vec<FlushPayload>, StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}

fn push_bounded(entries: &mut Vec<FlushPayload>, payload: &FlushPayload) {
    entries.push(payload.clone());
    if entries.len() > MAX_STORED_FLUSHES {
        let excess = entries.len() - MAX_STORED_FLUSHES;
        entries.drain(..excess);
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<FlushPayload>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PayloadStore for MemoryStore {
    fn append(&self, payload: &FlushPayload) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        push_bounded(&mut entries, payload);
        Ok(())
    }

    fn load(&self) -> Result<Vec<FlushPayload>, StoreError> {
        Ok(self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(())
    }
}

/// JSON-array file store with an optional byte quota.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    max_bytes: Option<usize>,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Store under `<dir>/ledgerwatch_telemetry.json`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::at_path(dir.as_ref().join(format!("{STORAGE_KEY}.json")))
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_bytes: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Reject writes whose serialized array would exceed `max_bytes`.
    pub fn with_quota(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Vec<FlushPayload>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn write_entries(&self, entries: &[FlushPayload]) -> Result<(), StoreError> {
        let content = serde_json::to_string(entries)?;

        if let Some(limit) = self.max_bytes {
            if content.len() > limit {
                return Err(StoreError::QuotaExceeded {
                    needed: content.len(),
                    limit,
                });
            }
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        fs::write(&self.path, content).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl PayloadStore for FileStore {
    fn append(&self, payload: &FlushPayload) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        // A corrupted array is replaced rather than blocking every later flush
        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(StoreError::Parse { path, source }) => {
                tracing::warn!(
                    "Discarding unreadable telemetry store {}: {}",
                    path.display(),
                    source
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        push_bounded(&mut entries, payload);
        self.write_entries(&entries)
    }

    fn load(&self) -> Result<Vec<FlushPayload>, StoreError> {
        self.read_entries()
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::payload::Resource;
    use chrono::Utc;
    use tempfile::tempdir;

    fn payload(marker: &str) -> FlushPayload {
        FlushPayload {
            timestamp: Utc::now(),
            spans: Vec::new(),
            metrics: Vec::new(),
            logs: Vec::new(),
            resource: Resource {
                service_name: marker.to_string(),
                service_version: "1.0.0".into(),
                environment: "test".into(),
            },
        }
    }

    #[test]
    fn test_memory_store_evicts_oldest() {
        let store = MemoryStore::new();
        for i in 0..=MAX_STORED_FLUSHES {
            store.append(&payload(&format!("p{i}"))).unwrap();
        }

        let entries = store.load().unwrap();
        assert_eq!(entries.len(), MAX_STORED_FLUSHES);
        assert_eq!(entries[0].resource.service_name, "p1");
        assert_eq!(
            entries.last().unwrap().resource.service_name,
            format!("p{MAX_STORED_FLUSHES}")
        );
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.load().unwrap().is_empty());
        assert!(store.clear().is_ok());
    }

    #[test]
    fn test_file_store_append_and_clear() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));
        store.append(&payload("a")).unwrap();
        store.append(&payload("b")).unwrap();

        assert!(store.path().ends_with("ledgerwatch_telemetry.json"));
        let entries = store.load().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].resource.service_name, "b");

        store.clear().unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_quota() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path()).with_quota(16);
        let err = store.append(&payload("too-big")).unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { limit: 16, .. }));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_replaces_corrupted_array() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        fs::write(store.path(), "{not json").unwrap();

        assert!(matches!(store.load(), Err(StoreError::Parse { .. })));
        store.append(&payload("fresh")).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }
}
