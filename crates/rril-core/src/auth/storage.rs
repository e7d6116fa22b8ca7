//! Durable key-value storage backends for the session store.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::debug;

use crate::error::StorageError;

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// A single mutation inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageWrite {
    Set { key: &'static str, value: String },
    Remove { key: &'static str },
}

impl StorageWrite {
    pub fn set(key: &'static str, value: impl Into<String>) -> Self {
        StorageWrite::Set {
            key,
            value: value.into(),
        }
    }

    pub fn remove(key: &'static str) -> Self {
        StorageWrite::Remove { key }
    }

    fn apply_to(&self, map: &mut BTreeMap<String, String>) {
        match self {
            StorageWrite::Set { key, value } => {
                map.insert((*key).to_string(), value.clone());
            }
            StorageWrite::Remove { key } => {
                map.remove(*key);
            }
        }
    }
}

/// Process-independent key-value store holding the session keys.
///
/// `apply` must be all-or-nothing: a reader never observes half of a batch
/// written by the same process.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Read several keys from one snapshot.
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StorageError> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    fn apply(&self, writes: &[StorageWrite]) -> Result<(), StorageError>;
}

/// Apply a batch to a copy of `map`, leaving the original untouched.
pub(crate) fn apply_batch(
    map: &BTreeMap<String, String>,
    writes: &[StorageWrite],
) -> BTreeMap<String, String> {
    let mut next = map.clone();
    for write in writes {
        write.apply_to(&mut next);
    }
    next
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Non-durable storage, used in tests and for `storage = "memory"`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    fn apply(&self, writes: &[StorageWrite]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        *entries = apply_batch(&entries, writes);
        Ok(())
    }
}

// ============================================================================
// File backend
// ============================================================================

/// Storage persisted as a JSON object in `<data_dir>/session.json`.
///
/// Batches from one process are serialised; other processes writing the
/// same file are not coordinated and the last rename wins.
pub struct FileStorage {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match std::fs::read_to_string(self.path()) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the file in one rename so a crash mid-write keeps the old contents.
    fn store(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let path = self.path();
        if map.is_empty() {
            if path.exists() {
                std::fs::remove_file(&path)?;
                debug!(?path, "Session file removed");
            }
            return Ok(());
        }

        std::fs::create_dir_all(&self.data_dir)?;
        let tmp = self
            .data_dir
            .join(format!("{}.{}.tmp", SESSION_FILE, std::process::id()));
        let contents = serde_json::to_string_pretty(map)?;
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StorageError> {
        let map = self.load()?;
        Ok(keys.iter().map(|key| map.get(*key).cloned()).collect())
    }

    fn apply(&self, writes: &[StorageWrite]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        let current = self.load()?;
        self.store(&apply_batch(&current, writes))
    }
}
