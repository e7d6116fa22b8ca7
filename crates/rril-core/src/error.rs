use thiserror::Error;

/// Errors raised by the session store.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid argument: {0} must not be empty")]
    InvalidArgument(&'static str),

    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors raised by a durable storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt session data: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}
