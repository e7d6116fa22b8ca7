//! HTTP collaborators of the session store.
//!
//! - `ApiClient`: login call and bearer-authenticated requests against the
//!   admin backend. Unauthorized responses clear the session.
//! - `ContactClient`: posts the public contact form to a third-party form
//!   endpoint. No session involved.

pub mod client;
pub mod contact;
pub mod error;

pub use client::{ApiClient, LoginGrant, Profile};
pub use contact::{ContactClient, ContactError, ContactForm};
pub use error::ApiError;
