//! Timeline persistence: the injected key/value store contract and two
//! shipped implementations.
//!
//! Store failures never escape the manager; they are logged and the
//! in-memory timeline stays authoritative.

use core_model::MergeTimeline;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("storage failure: {message}")]
pub struct StorageError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Abstract key/value persistence for timelines. Implementations own
/// their synchronization; the manager calls sequentially per save.
pub trait TimelineStore: Send + Sync {
    fn save(&self, key: &str, timeline: &MergeTimeline) -> Result<(), StorageError>;
    fn load(&self, key: &str) -> Result<Option<MergeTimeline>, StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory store; the default for tests and for sessions that opted out
/// of persistence.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("memory store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TimelineStore for MemoryStore {
    fn save(&self, key: &str, timeline: &MergeTimeline) -> Result<(), StorageError> {
        let json = serde_json::to_string(timeline)
            .map_err(|e| StorageError::with_source("serialize timeline", e))?;
        self.entries
            .lock()
            .expect("memory store poisoned")
            .insert(key.to_string(), json);
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<MergeTimeline>, StorageError> {
        let entries = self.entries.lock().expect("memory store poisoned");
        match entries.get(key) {
            None => Ok(None),
            Some(json) => serde_json::from_str(json)
                .map(Some)
                .map_err(|e| StorageError::with_source("deserialize timeline", e)),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .expect("memory store poisoned")
            .remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl TimelineStore for JsonFileStore {
    fn save(&self, key: &str, timeline: &MergeTimeline) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| StorageError::with_source("create store dir", e))?;
        let json = serde_json::to_string(timeline)
            .map_err(|e| StorageError::with_source("serialize timeline", e))?;
        std::fs::write(self.path_for(key), json)
            .map_err(|e| StorageError::with_source("write timeline", e))
    }

    fn load(&self, key: &str) -> Result<Option<MergeTimeline>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)
            .map_err(|e| StorageError::with_source("read timeline", e))?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| StorageError::with_source("deserialize timeline", e))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(path)
                .map_err(|e| StorageError::with_source("delete timeline", e))?;
        }
        Ok(())
    }
}

/// Store that always fails; exercises the degradation path in tests.
pub struct FailingStore;

impl TimelineStore for FailingStore {
    fn save(&self, _key: &str, _timeline: &MergeTimeline) -> Result<(), StorageError> {
        Err(StorageError::new("save refused"))
    }

    fn load(&self, _key: &str) -> Result<Option<MergeTimeline>, StorageError> {
        Err(StorageError::new("load refused"))
    }

    fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::new("delete refused"))
    }
}
