use thiserror::Error;
use tracing::{error, info};

use super::{Session, SessionStore};
use crate::api::{ApiClient, ApiError};
use crate::error::SessionError;

#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Email and password required")]
    MissingCredentials,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl LoginError {
    /// Short message for the login screen
    pub fn user_message(&self) -> String {
        match self {
            LoginError::MissingCredentials => self.to_string(),
            LoginError::Api(e) if e.is_unauthorized() => "Invalid email or password".to_string(),
            LoginError::Api(ApiError::AccessDenied(_)) => {
                "This account does not have admin access".to_string()
            }
            LoginError::Api(e) if e.is_timeout() => "Connection timed out. Please try again.".to_string(),
            LoginError::Api(e) if e.is_connect() => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            LoginError::Api(ApiError::RateLimited) => {
                "Server is busy. Please wait a moment and try again.".to_string()
            }
            other => format!("Login failed: {}", other),
        }
    }
}

/// Producer side of the session: authenticates and establishes.
#[derive(Clone)]
pub struct LoginFlow {
    api: ApiClient,
    store: SessionStore,
}

impl LoginFlow {
    pub fn new(api: ApiClient, store: SessionStore) -> Self {
        Self { api, store }
    }

    /// Authenticate and, only on success, replace the current session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, LoginError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(LoginError::MissingCredentials);
        }

        let grant = match self.api.authenticate(email, password).await {
            Ok(grant) => grant,
            Err(e) => {
                error!(error = %e, "Login failed");
                return Err(e.into());
            }
        };

        self.store
            .establish(&grant.token, &grant.email, grant.name.as_deref())?;
        info!("Login successful");
        Ok(self.store.current()?)
    }
}
