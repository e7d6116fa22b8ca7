//! Application configuration management.
//!
//! This module handles loading and saving the admin configuration, which
//! includes the API base URL, the contact form endpoint, the session
//! storage backend and the last used email.
//!
//! Configuration is stored at `~/.config/rril-admin/config.json`.
//! `RRIL_API_URL`, `RRIL_CONTACT_ENDPOINT` and `RRIL_STORAGE` override
//! the file.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::{FileStorage, KeyringStorage, MemoryStorage, SessionStore, Storage};
use crate::error::StorageError;

/// Application name used for config/data directory paths
const APP_NAME: &str = "rril-admin";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "https://api.rril.com";

const DEFAULT_CONTACT_ENDPOINT: &str = "https://formspree.io/f/rril-contact";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not find {0} directory")]
    NoDirectory(&'static str),

    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown storage backend: {0}")]
    UnknownStorage(String),

    #[error("Failed to open session storage: {0}")]
    Storage(#[from] StorageError),
}

/// Where the session keys are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "keyring" | "keychain" => Ok(StorageBackend::Keyring),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::UnknownStorage(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub contact_endpoint: String,
    pub storage: StorageBackend,
    pub last_email: Option<String>,
    /// Overrides the session data directory
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            contact_endpoint: DEFAULT_CONTACT_ENDPOINT.to_string(),
            storage: StorageBackend::default(),
            last_email: None,
            data_dir: None,
        }
    }
}

impl Config {
    /// Load from the config file (or defaults), then apply env overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            debug!(?path, "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("RRIL_API_URL").filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(endpoint) = lookup("RRIL_CONTACT_ENDPOINT").filter(|v| !v.is_empty()) {
            self.contact_endpoint = endpoint;
        }
        if let Some(storage) = lookup("RRIL_STORAGE") {
            match storage.parse() {
                Ok(backend) => self.storage = backend,
                Err(e) => warn!(error = %e, "Ignoring RRIL_STORAGE"),
            }
        }
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoDirectory("config"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir().ok_or(ConfigError::NoDirectory("data"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Build the process-wide session store for the configured backend
    pub fn session_store(&self) -> Result<SessionStore, ConfigError> {
        let storage: Arc<dyn Storage> = match self.storage {
            StorageBackend::File => Arc::new(FileStorage::new(self.data_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStorage::new()?),
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        };
        debug!(backend = ?self.storage, "Session store opened");
        Ok(SessionStore::new(storage))
    }
}
