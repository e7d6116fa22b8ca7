use std::collections::BTreeMap;
use std::sync::Mutex;

use keyring::Entry;
use tracing::debug;

use super::storage::{apply_batch, Storage, StorageWrite};
use crate::error::StorageError;

const SERVICE_NAME: &str = "rril-admin";

/// Keychain account holding the session keys
const ENTRY_NAME: &str = "session";

/// Session storage kept in the OS keychain.
///
/// All keys live in one keychain entry as a JSON object, so a batch is a
/// single `set_password` call. The entry is opened once and reused.
pub struct KeyringStorage {
    service: String,
    entry: Entry,
    write_lock: Mutex<()>,
}

impl KeyringStorage {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a custom keychain service name (e.g. one per environment)
    pub fn with_service(service: &str) -> Result<Self, StorageError> {
        Ok(Self {
            service: service.to_string(),
            entry: Entry::new(service, ENTRY_NAME)?,
            write_lock: Mutex::new(()),
        })
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match self.entry.get_password() {
            Ok(secret) => Ok(serde_json::from_str(&secret)?),
            Err(keyring::Error::NoEntry) => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if map.is_empty() {
            return match self.entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {
                    debug!(service = %self.service, "Keychain session entry removed");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            };
        }
        self.entry.set_password(&serde_json::to_string(map)?)?;
        Ok(())
    }
}

impl Storage for KeyringStorage {
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
