use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

const VALUE_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded ({needed} bytes needed, {quota} allowed)")]
    QuotaExceeded { needed: u64, quota: u64 },
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StorageError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

/// String key-value storage with an optional total size quota, in the
/// manner of browser local storage.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

fn check_quota(quota: Option<u64>, others: u64, value: &str) -> Result<(), StorageError> {
    let Some(quota) = quota else {
        return Ok(());
    };
    let needed = others + value.len() as u64;
    if needed > quota {
        return Err(StorageError::QuotaExceeded { needed, quota });
    }
    Ok(())
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// One file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    writer: AtomicFileWriter,
    quota: Option<u64>,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
            quota: None,
        }
    }

    /// Caps the combined size of all stored values.
    pub fn with_quota(mut self, quota_bytes: u64) -> Self {
        self.quota = Some(quota_bytes);
        self
    }

    pub fn dir(&self) -> &Path {
        self.writer.dir()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir().join(file_name(key))
    }

    /// Bytes used by every stored value except `key`.
    fn used_by_others(&self, key: &str) -> Result<u64, StorageError> {
        let own = file_name(key);
        let entries = match fs::read_dir(self.dir()) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        let mut used = 0;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let is_value = path.extension().is_some_and(|ext| ext == VALUE_EXTENSION);
            if is_value && entry.file_name() != own.as_str() {
                used += entry.metadata()?.len();
            }
        }
        Ok(used)
    }
}

fn file_name(key: &str) -> String {
    format!("{key}.{VALUE_EXTENSION}")
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        validate_key(key)?;
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        if self.quota.is_some() {
            check_quota(self.quota, self.used_by_others(key)?, value)?;
        }
        self.writer.write(&file_name(key), value.as_bytes())?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    values: HashMap<String, String>,
    quota: Option<u64>,
}

/// In-memory store. Clones share the same underlying map, so a caller can
/// hand one clone to a [`crate::HistoryStore`] and inspect another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        let store = Self::default();
        store.set_quota(Some(quota_bytes));
        store
    }

    pub fn set_quota(&self, quota_bytes: Option<u64>) {
        self.lock().quota = quota_bytes;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.lock();
        let others: u64 = inner
            .values
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.len() as u64)
            .sum();
        check_quota(inner.quota, others, value)?;
        inner.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
