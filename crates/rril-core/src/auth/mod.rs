//! Authentication module for managing the admin session.
//!
//! This module provides:
//! - `SessionStore`: establish, read and clear the current session
//! - `Storage` backends: in-memory, JSON file and OS keychain
//! - `LoginFlow`: turns credentials into an established session
//! - Route guard helpers for protected pages and logout
//!
//! Sessions have no expiry of their own; they end on logout or when the
//! backend rejects the token.

pub mod credentials;
pub mod guard;
pub mod login;
pub mod session;
pub mod storage;

pub use credentials::KeyringStorage;
pub use guard::{logout, redirect_if_authenticated, require_session, Access, DASHBOARD_ROUTE, LOGIN_ROUTE};
pub use login::{LoginError, LoginFlow};
pub use session::{Session, SessionState, SessionStore};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageWrite};
