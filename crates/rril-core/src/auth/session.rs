use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::storage::{Storage, StorageWrite};
use crate::error::SessionError;

/// Durable store keys. Consumers go through `SessionStore`, never these.
pub const TOKEN_KEY: &str = "auth_token";
pub const AUTHENTICATED_KEY: &str = "isAuthenticated";
pub const EMAIL_KEY: &str = "userEmail";
pub const NAME_KEY: &str = "userName";

const SESSION_KEYS: [&str; 4] = [TOKEN_KEY, AUTHENTICATED_KEY, EMAIL_KEY, NAME_KEY];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

/// Snapshot of the current user's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Session {
    pub token: Option<String>,
    pub is_authenticated: bool,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self {
            token: None,
            is_authenticated: false,
            user_email: None,
            user_name: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.is_authenticated {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    /// Name for header displays: the user's name, else their email
    pub fn display_name(&self) -> Option<&str> {
        self.user_name.as_deref().or(self.user_email.as_deref())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Single source of truth for the authenticated user.
///
/// Cheap to clone; every clone shares the same backing storage. Construct
/// one per process and hand clones to the login flow, API client and
/// route guards.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Store backed by an in-memory map
    pub fn in_memory() -> Self {
        Self::new(Arc::new(super::storage::MemoryStorage::new()))
    }

    /// Record a new authenticated session, replacing any previous one.
    ///
    /// Nothing is written when `token` or `email` is empty.
    pub fn establish(
        &self,
        token: &str,
        email: &str,
        name: Option<&str>,
    ) -> Result<(), SessionError> {
        if token.trim().is_empty() {
            return Err(SessionError::InvalidArgument("token"));
        }
        if email.trim().is_empty() {
            return Err(SessionError::InvalidArgument("email"));
        }

        let name_write = match name.filter(|n| !n.trim().is_empty()) {
            Some(name) => StorageWrite::set(NAME_KEY, name),
            None => StorageWrite::remove(NAME_KEY),
        };

        self.storage.apply(&[
            StorageWrite::set(TOKEN_KEY, token),
            StorageWrite::set(AUTHENTICATED_KEY, "true"),
            StorageWrite::set(EMAIL_KEY, email),
            name_write,
        ])?;

        info!(email = %email, "Session established");
        Ok(())
    }

    /// Read the session, deriving `is_authenticated` from the token.
    pub fn current(&self) -> Result<Session, SessionError> {
        let mut values = self.storage.get_many(&SESSION_KEYS)?.into_iter();
        let token = non_empty(values.next().flatten());
        let stored_flag = values.next().flatten();
        let user_email = non_empty(values.next().flatten());
        let user_name = non_empty(values.next().flatten());

        let is_authenticated = token.is_some();
        if stored_flag.as_deref() == Some("true") && !is_authenticated {
            debug!("Stored authentication flag without a token, ignoring");
        }

        if !is_authenticated {
            return Ok(Session::anonymous());
        }

        if user_email.is_none() {
            warn!("Stored session has a token but no email, treating as anonymous");
            return Ok(Session::anonymous());
        }

        Ok(Session {
            token,
            is_authenticated,
            user_email,
            user_name,
        })
    }

    /// Remove every session key. Safe to call with no session.
    pub fn clear(&self) -> Result<(), SessionError> {
        let writes: Vec<StorageWrite> = SESSION_KEYS
            .iter()
            .map(|key| StorageWrite::remove(*key))
            .collect();
        self.storage.apply(&writes)?;
        debug!("Session cleared");
        Ok(())
    }

    /// Whether a user is currently authenticated. Read failures count as no.
    pub fn is_valid(&self) -> bool {
        match self.current() {
            Ok(session) => session.is_authenticated,
            Err(e) => {
                warn!(error = %e, "Failed to read session");
                false
            }
        }
    }

    pub fn state(&self) -> SessionState {
        if self.is_valid() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    /// Bearer token of the current session, if any
    pub fn token(&self) -> Result<Option<String>, SessionError> {
        Ok(self.current()?.token)
    }
}
