//! Admin application state.
//!
//! `App` owns the configuration and the process-wide session store, and
//! hands clones of the store to the API client and login flow.

use std::io::{self, Write};

use anyhow::{Context, Result};
use rril_core::api::{ApiClient, ApiError, ContactClient, ContactForm, Profile};
use rril_core::auth::{self, Access, LoginFlow};
use rril_core::{Config, Session, SessionStore};
use tracing::{debug, info, warn};

/// Longest display name shown by `status`
const MAX_DISPLAY_NAME_LEN: usize = 40;

pub struct App {
    pub config: Config,
    pub session: SessionStore,
    pub api: ApiClient,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let session = config
            .session_store()
            .context("Failed to open session storage")?;
        let api = ApiClient::from_config(&config, session.clone())
            .context("Failed to create API client")?;
        debug!(api = %config.api_base_url, "App initialized");

        Ok(Self {
            config,
            session,
            api,
        })
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub fn is_authenticated(&self) -> bool {
        self.session.is_valid()
    }

    /// Pick the login email: flag, then env var, then the remembered one
    pub fn login_email(&self, flag: Option<String>) -> Option<String> {
        flag.or_else(|| std::env::var("RRIL_ADMIN_EMAIL").ok())
            .or_else(|| self.config.last_email.clone())
            .filter(|e| !e.trim().is_empty())
    }

    pub async fn login(&mut self, email: Option<String>, name: Option<String>) -> Result<Session> {
        if let Some(route) = auth::redirect_if_authenticated(&self.session) {
            info!(route, "Already signed in, replacing session");
        }

        let email = match self.login_email(email) {
            Some(email) => email,
            None => prompt("Email: ")?,
        };
        let password = match std::env::var("RRIL_ADMIN_PASSWORD") {
            Ok(password) if !password.is_empty() => password,
            _ => rpassword::prompt_password("Password: ").context("Failed to read password")?,
        };

        let flow = LoginFlow::new(self.api.clone(), self.session.clone());
        let mut session = match flow.login(&email, &password).await {
            Ok(session) => session,
            Err(e) => anyhow::bail!(e.user_message()),
        };

        // A display name given locally wins over a missing one from the backend
        if session.user_name.is_none() {
            let local = (
                name.filter(|n| !n.trim().is_empty()),
                session.token.clone(),
                session.user_email.clone(),
            );
            if let (Some(name), Some(token), Some(email)) = local {
                self.session.establish(&token, &email, Some(&name))?;
                session = self.session.current()?;
            }
        }

        self.config.last_email = Some(email.trim().to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        Ok(session)
    }

    pub fn logout(&self) -> Result<&'static str> {
        auth::logout(&self.session).context("Failed to clear session")
    }

    pub fn status_lines(&self) -> Result<Vec<String>> {
        let session = self.session.current().context("Failed to read session")?;
        Ok(status_lines(&session))
    }

    pub fn session_json(&self) -> Result<String> {
        let mut session = self.session.current().context("Failed to read session")?;
        session.token = session.token.as_deref().map(rril_core::utils::mask_token);
        Ok(serde_json::to_string_pretty(&session)?)
    }

    /// Fetch the profile behind the route guard
    pub async fn whoami(&self) -> Result<Profile> {
        if let Access::Redirect(route) = auth::require_session(&self.session) {
            anyhow::bail!("Not signed in. Log in first ({}).", route);
        }
        match self.api.fetch_profile().await {
            Ok(profile) => Ok(profile),
            Err(ApiError::Unauthorized) => {
                anyhow::bail!("Session expired. Please log in again.")
            }
            Err(e) => Err(e).context("Failed to fetch profile"),
        }
    }

    // =========================================================================
    // Contact form
    // =========================================================================

    pub async fn send_contact(&self, form: &ContactForm) -> Result<()> {
        let contact = ContactClient::new(self.api.http().clone(), &self.config.contact_endpoint);
        contact
            .submit(form)
            .await
            .context("Failed to submit contact form")
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Human-readable session summary
pub fn status_lines(session: &Session) -> Vec<String> {
    if !session.is_authenticated {
        return vec!["Not signed in".to_string()];
    }

    let mut lines = vec![format!(
        "Signed in as {}",
        rril_core::utils::truncate_string(session.display_name().unwrap_or("unknown"), MAX_DISPLAY_NAME_LEN)
    )];
    if let (Some(_), Some(email)) = (&session.user_name, &session.user_email) {
        lines.push(format!("Email: {}", email));
    }
    if let Some(ref token) = session.token {
        lines.push(format!("Token: {}", rril_core::utils::mask_token(token)));
    }
    lines
}
