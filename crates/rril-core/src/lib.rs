//! Core library for rril-admin.
//!
//! The session store is the single source of truth for whether an admin
//! is signed in. The login flow produces sessions, the API client and
//! route guards consume them, and the contact client posts the public
//! contact form.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod utils;

pub use auth::{Session, SessionState, SessionStore};
pub use config::Config;
pub use error::{SessionError, StorageError};
