//! Contact form submission to the third-party form endpoint.

use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::ApiError;

/// Longest message the form accepts, in characters
const MAX_MESSAGE_CHARS: usize = 5000;

#[derive(Error, Debug)]
pub enum ContactError {
    #[error("Invalid {0}")]
    Invalid(&'static str),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

/// Loose `local@domain.tld` check; the form endpoint does the real validation.
fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
                && domain
                    .split_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
                    .unwrap_or(false)
        }
        None => false,
    }
}

impl ContactForm {
    pub fn validate(&self) -> Result<(), ContactError> {
        if self.name.trim().is_empty() {
            return Err(ContactError::Invalid("name"));
        }
        if !looks_like_email(self.email.trim()) {
            return Err(ContactError::Invalid("email"));
        }
        let message = self.message.trim();
        if message.is_empty() || message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ContactError::Invalid("message"));
        }
        Ok(())
    }

    /// Trimmed copy with blank optional fields dropped
    fn normalized(&self) -> Self {
        let optional = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: optional(&self.phone),
            subject: optional(&self.subject),
            message: self.message.trim().to_string(),
        }
    }
}

/// Posts contact forms; needs no session.
#[derive(Clone)]
pub struct ContactClient {
    client: Client,
    endpoint: String,
}

impl ContactClient {
    pub fn new(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }

    pub async fn submit(&self, form: &ContactForm) -> Result<(), ContactError> {
        form.validate()?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::ACCEPT, "application/json")
            .json(&form.normalized())
            .send()
            .await
            .map_err(ApiError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body).into());
        }

        info!(email = %form.email.trim(), "Contact form submitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn form() -> ContactForm {
        ContactForm {
            name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            phone: None,
            subject: Some("Solar quote".to_string()),
            message: "Please contact me about rooftop solar.".to_string(),
        }
    }

    #[test]
    fn test_valid_form() {
        assert!(form().validate().is_ok());
    }

    #[test]
    fn test_required_fields() {
        let f = ContactForm { name: "  ".into(), ..form() };
        assert!(matches!(f.validate(), Err(ContactError::Invalid("name"))));

        let f = ContactForm { message: String::new(), ..form() };
        assert!(matches!(f.validate(), Err(ContactError::Invalid("message"))));

        let f = ContactForm { message: "x".repeat(MAX_MESSAGE_CHARS + 1), ..form() };
        assert!(matches!(f.validate(), Err(ContactError::Invalid("message"))));
    }

    #[test]
    fn test_email_check() {
        assert!(looks_like_email("a@b.co"));
        assert!(looks_like_email("first.last@mail.rril.com"));
        assert!(!looks_like_email(""));
        assert!(!looks_like_email("no-at-sign"));
        assert!(!looks_like_email("@rril.com"));
        assert!(!looks_like_email("a@localhost"));
        assert!(!looks_like_email("a@@b.com"));
        assert!(!looks_like_email("a b@c.com"));
    }

    #[tokio::test]
    async fn test_submit_posts_normalized_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({
                "name": "Jane Doe",
                "email": "jane@example.com",
                "subject": "Solar quote",
                "message": "Please contact me about rooftop solar."
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let contact = ContactClient::new(Client::new(), &server.uri());
        let submission = ContactForm {
            name: " Jane Doe ".into(),
            phone: Some("  ".into()),
            ..form()
        };
        contact.submit(&submission).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_form_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let contact = ContactClient::new(Client::new(), &server.uri());
        let f = ContactForm { email: "nope".into(), ..form() };
        assert!(matches!(contact.submit(&f).await, Err(ContactError::Invalid("email"))));
    }

    #[tokio::test]
    async fn test_endpoint_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("spam detected"))
            .mount(&server)
            .await;

        let contact = ContactClient::new(Client::new(), &server.uri());
        let err = contact.submit(&form()).await.unwrap_err();
        assert!(matches!(err, ContactError::Api(ApiError::InvalidResponse(msg)) if msg.contains("spam")));
    }
}
