//! Key-value storage backends
//!
//! Federation state is persisted through a small `get`/`put`/`delete`
//! interface so the same provider runs against memory in tests and against
//! a JSON file on disk.

use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};
use thiserror::Error;

use crate::error::ErrorReason;
use crate::federation::FederationError;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Storage lock poisoned")]
    LockPoisoned,
    #[error("Federation error: {0}")]
    Federation(#[from] FederationError),
}

impl StorageError {
    pub fn reason(&self) -> ErrorReason {
        match self {
            StorageError::IoError(_) | StorageError::LockPoisoned => {
                ErrorReason::StorageUnavailable
            }
            StorageError::SerializationError(_) | StorageError::InvalidData(_) => {
                ErrorReason::CorruptStorage
            }
            StorageError::Federation(e) => e.reason(),
        }
    }
}

/// Raw key-value access
pub trait StorageAccessor {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// In-memory backend
// =============================================================================

/// Storage kept in a map, lost on drop
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageAccessor for InMemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// JSON file backend
// =============================================================================

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub storage_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".federation_data"),
            storage_file: "federation.json".to_string(),
        }
    }
}

/// Storage kept in a single JSON document mapping keys to hex values
///
/// Every write rewrites the document to a temporary file and renames it
/// over the original, so a crash never leaves a half-written store.
pub struct JsonFileStorage {
    config: StorageConfig,
    write_lock: Mutex<()>,
}

impl JsonFileStorage {
    /// Create a new file storage, creating the data directory if needed
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self {
            config,
            write_lock: Mutex::new(()),
        })
    }

    fn storage_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.storage_file)
    }

    fn load_entries(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let path = self.storage_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let file = fs::File::open(&path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let temp_path = self
            .config
            .data_dir
            .join(format!("{}.tmp", self.config.storage_file));
        let file = fs::File::create(&temp_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), entries)?;

        // Atomic rename
        fs::rename(&temp_path, self.storage_path())?;
        debug!("Wrote {} storage entries to {:?}", entries.len(), self.storage_path());
        Ok(())
    }

    fn update<F>(&self, change: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::LockPoisoned)?;
        let mut entries = self.load_entries()?;
        change(&mut entries);
        self.write_entries(&entries)
    }
}

impl StorageAccessor for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.load_entries()?.get(key) {
            Some(value) => hex::decode(value)
                .map(Some)
                .map_err(|e| StorageError::InvalidData(format!("entry {}: {}", key, e))),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.insert(key.to_string(), hex::encode(value));
        })
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(storage: &dyn StorageAccessor) {
        assert_eq!(storage.get("missing").unwrap(), None);

        storage.put("key", vec![1, 2, 3]).unwrap();
        assert_eq!(storage.get("key").unwrap(), Some(vec![1, 2, 3]));

        storage.put("key", vec![4]).unwrap();
        assert_eq!(storage.get("key").unwrap(), Some(vec![4]));

        storage.delete("key").unwrap();
        assert_eq!(storage.get("key").unwrap(), None);
        storage.delete("key").unwrap();
    }

    #[test]
    fn test_in_memory_storage() {
        let storage = InMemoryStorage::new();
        exercise(&storage);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_json_file_storage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
            ..Default::default()
        };
        let storage = JsonFileStorage::new(config).unwrap();
        exercise(&storage);
    }

    #[test]
    fn test_json_file_storage_persists_across_instances() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            data_dir: temp_dir.path().join("nested"),
            storage_file: "store.json".to_string(),
        };

        JsonFileStorage::new(config.clone())
            .unwrap()
            .put("federation", b"data".to_vec())
            .unwrap();

        let reopened = JsonFileStorage::new(config.clone()).unwrap();
        assert_eq!(reopened.get("federation").unwrap(), Some(b"data".to_vec()));
        assert!(!config.data_dir.join("store.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
            ..Default::default()
        };
        fs::write(temp_dir.path().join("federation.json"), r#"{"key": "zz"}"#).unwrap();

        let storage = JsonFileStorage::new(config).unwrap();
        let error = storage.get("key").unwrap_err();
        assert_eq!(error.reason(), ErrorReason::CorruptStorage);
    }
}
