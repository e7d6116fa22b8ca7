//! API client for the RRIL admin backend.
//!
//! `ApiClient` performs the login call and authenticated requests. The
//! bearer token is always read from the shared `SessionStore`; a 401 on an
//! authenticated request clears that store before the error is returned.

use std::time::Duration;

use reqwest::{header, Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::ApiError;
use crate::auth::SessionStore;
use crate::config::Config;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

const LOGIN_PATH: &str = "/auth/login";
const PROFILE_PATH: &str = "/auth/me";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default, alias = "accessToken", alias = "access_token")]
    token: Option<String>,
    #[serde(default)]
    user: Option<AuthUser>,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl AuthResponse {
    /// Check the response shape, falling back to the submitted email.
    fn into_grant(self, submitted_email: &str) -> Result<LoginGrant, ApiError> {
        let token = self
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("login response has no token".into()))?;

        let (email, name) = match self.user {
            Some(user) => (user.email, user.name),
            None => (None, None),
        };
        let email = email
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| submitted_email.to_string());
        let name = name.filter(|n| !n.trim().is_empty());

        Ok(LoginGrant { token, email, name })
    }
}

/// Validated result of a successful login call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub token: String,
    pub email: String,
    pub name: Option<String>,
}

/// Signed-in user as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Profile {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// API client for the admin backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionStore,
    initial_backoff_ms: u64,
}

impl ApiClient {
    pub fn new(base_url: &str, session: SessionStore) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            initial_backoff_ms: INITIAL_BACKOFF_MS,
        })
    }

    pub fn from_config(config: &Config, session: SessionStore) -> Result<Self, ApiError> {
        Self::new(&config.api_base_url, session)
    }

    /// Underlying HTTP client, for sharing the connection pool
    pub fn http(&self) -> &Client {
        &self.client
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Exchange credentials for a validated login grant.
    ///
    /// Does not touch the session store; a rejected login leaves any
    /// existing session in place.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<LoginGrant, ApiError> {
        let url = self.url(LOGIN_PATH);

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let body = response.text().await?;
        let auth: AuthResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("login response: {}", e)))?;

        let grant = auth.into_grant(email)?;
        info!(email = %grant.email, "Authenticated");
        Ok(grant)
    }

    fn bearer_token(&self) -> Result<String, ApiError> {
        self.session.token()?.ok_or(ApiError::NotAuthenticated)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Like `check_response` for authenticated calls.
    /// Returns Ok(None) for rate limit (should retry). An unauthorized
    /// response clears the session before the error is surfaced.
    async fn check_authorized_response(&self, response: Response) -> Result<Option<Response>, ApiError> {
        if response.status().as_u16() == 429 {
            return Ok(None);
        }
        match Self::check_response(response).await {
            Ok(response) => Ok(Some(response)),
            Err(ApiError::Unauthorized) => {
                warn!("Server rejected the session token, clearing session");
                self.session.clear()?;
                Err(ApiError::Unauthorized)
            }
            Err(e) => Err(e),
        }
    }

    async fn send_with_retry<T, F>(&self, build: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let token = self.bearer_token()?;
        let mut retries = 0;
        let mut backoff_ms = self.initial_backoff_ms;

        loop {
            let response = build(token.as_str()).send().await?;

            match self.check_authorized_response(response).await? {
                Some(response) => {
                    let body = response.text().await?;
                    return serde_json::from_str(&body)
                        .map_err(|e| ApiError::InvalidResponse(e.to_string()));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        self.send_with_retry(|token| self.client.get(&url).bearer_auth(token))
            .await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "POST");
        self.send_with_retry(|token| self.client.post(&url).bearer_auth(token).json(body))
            .await
    }

    /// Fetch the signed-in user's profile
    pub async fn fetch_profile(&self) -> Result<Profile, ApiError> {
        self.get(PROFILE_PATH).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn parse(value: serde_json::Value) -> AuthResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_grant_from_full_response() {
        let grant = parse(json!({
            "token": "tkn-123",
            "user": {"email": "admin@rril.com", "name": "Admin User"}
        }))
        .into_grant("typed@rril.com")
        .unwrap();

        assert_eq!(grant.token, "tkn-123");
        assert_eq!(grant.email, "admin@rril.com");
        assert_eq!(grant.name.as_deref(), Some("Admin User"));
    }

    #[test]
    fn test_grant_accepts_access_token_alias() {
        let grant = parse(json!({"accessToken": "abc"}))
            .into_grant("typed@rril.com")
            .unwrap();
        assert_eq!(grant.token, "abc");
        assert_eq!(grant.email, "typed@rril.com");
        assert_eq!(grant.name, None);
    }

    #[test]
    fn test_grant_rejects_missing_or_empty_token() {
        assert!(matches!(
            parse(json!({"user": {"email": "a@b.com"}})).into_grant("a@b.com"),
            Err(ApiError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse(json!({"token": ""})).into_grant("a@b.com"),
            Err(ApiError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_posts_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({"email": "admin@rril.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "tkn-123",
                "user": {"email": "admin@rril.com", "name": "Admin User"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = SessionStore::in_memory();
        let api = ApiClient::new(&server.uri(), store.clone()).unwrap();
        let grant = api.authenticate("admin@rril.com", "pw").await.unwrap();

        assert_eq!(grant.token, "tkn-123");
        // authenticate alone never establishes a session
        assert!(!store.is_valid());
    }

    #[tokio::test]
    async fn test_authenticate_rejected_keeps_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store = SessionStore::in_memory();
        store.establish("old", "old@rril.com", None).unwrap();
        let api = ApiClient::new(&server.uri(), store.clone()).unwrap();

        let err = api.authenticate("old@rril.com", "wrong").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(store.token().unwrap().as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_get_attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .and(header_eq("authorization", "Bearer tkn-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "email": "admin@rril.com",
                "name": "Admin User",
                "role": "admin"
            })))
            .mount(&server)
            .await;

        let store = SessionStore::in_memory();
        store.establish("tkn-123", "admin@rril.com", None).unwrap();
        let api = ApiClient::new(&format!("{}/", server.uri()), store).unwrap();

        let profile = api.fetch_profile().await.unwrap();
        assert_eq!(profile.email, "admin@rril.com");
        assert_eq!(profile.role.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store = SessionStore::in_memory();
        store.establish("revoked", "admin@rril.com", Some("Admin")).unwrap();
        let api = ApiClient::new(&server.uri(), store.clone()).unwrap();

        let err = api.fetch_profile().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(!store.is_valid());
        assert_eq!(store.current().unwrap().user_name, None);
    }

    #[tokio::test]
    async fn test_other_errors_keep_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/content"))
            .respond_with(ResponseTemplate::new(403).set_body_string("admins only"))
            .mount(&server)
            .await;

        let store = SessionStore::in_memory();
        store.establish("tok", "editor@rril.com", None).unwrap();
        let api = ApiClient::new(&server.uri(), store.clone()).unwrap();

        let err = api
            .post::<serde_json::Value, _>("/content", &json!({"title": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AccessDenied(body) if body == "admins only"));
        assert!(store.is_valid());
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(429))
            .expect(u64::from(MAX_RATE_LIMIT_RETRIES) + 1)
            .mount(&server)
            .await;

        let store = SessionStore::in_memory();
        store.establish("tok", "admin@rril.com", None).unwrap();
        let mut api = ApiClient::new(&server.uri(), store.clone()).unwrap();
        api.initial_backoff_ms = 5;

        let err = api.fetch_profile().await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited));
        // Rate limiting says nothing about the token
        assert!(store.is_valid());
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "email": "admin@rril.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = SessionStore::in_memory();
        store.establish("tok", "admin@rril.com", None).unwrap();
        let mut api = ApiClient::new(&server.uri(), store.clone()).unwrap();
        api.initial_backoff_ms = 5;

        let profile = api.fetch_profile().await.unwrap();
        assert_eq!(profile.email, "admin@rril.com");
        assert_eq!(profile.name, None);
        assert!(store.is_valid());
    }

    #[tokio::test]
    async fn test_no_session_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let api = ApiClient::new(&server.uri(), SessionStore::in_memory()).unwrap();
        let err = api.fetch_profile().await.unwrap_err();
        assert!(matches!(err, ApiError::NotAuthenticated));
    }
}
