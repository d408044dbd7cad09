//! Pxl Platform Client
//!
//! A small, typed HTTP client for the platform's pipeline registry.
//!
//! Only the calls the orchestrator needs are covered: registering a pipeline
//! asset (updating it when it already exists) and pushing new default
//! parameters to an asset that is already registered.
//!
//! # Example
//!
//! ```no_run
//! use pxl_client::{PlatformClient, RegisterPipeline};
//! use pxl_core::domain::auth::{AuthContext, Credential, Environment};
//!
//! # async fn example() -> pxl_client::Result<()> {
//! let auth = AuthContext::new("acme", Environment::Staging)
//!     .with_credential(Credential::new("token"));
//! let client = PlatformClient::from_auth(&auth)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
mod pipelines;
#[cfg(test)]
mod test_server;

pub use error::{ClientError, Result};
pub use pipelines::{RegisterPipeline, Registration, SyncOutcome};

use pxl_core::domain::auth::AuthContext;
use reqwest::{Client, Response};

/// HTTP client for the platform registry API
#[derive(Debug, Clone)]
pub struct PlatformClient {
    /// Base URL of the platform (e.g., "https://app.picsellia.com")
    base_url: String,
    organization: String,
    token: String,
    client: Client,
}

impl PlatformClient {
    /// Create a new platform client
    ///
    /// # Arguments
    /// * `base_url` - The platform host
    /// * `organization` - Organization the assets belong to
    /// * `token` - API token
    pub fn new(
        base_url: impl Into<String>,
        organization: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            organization: organization.into(),
            token: token.into(),
            client: Client::new(),
        }
    }

    /// Create a client for the environment and credential of an invocation
    pub fn from_auth(auth: &AuthContext) -> Result<Self> {
        let credential = auth
            .credential
            .as_ref()
            .ok_or_else(|| ClientError::MissingCredential(auth.token_env_key()))?;

        Ok(Self::new(
            auth.host(),
            auth.organization.clone(),
            credential.expose(),
        ))
    }

    /// Get the base URL of the platform
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn organization_url(&self) -> String {
        format!(
            "{}/api/organization/{}",
            self.base_url, self.organization
        )
    }

    /// Passes a successful response through, turns any other into `ApiError`
    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::api_error(status.as_u16(), error_message(&body)))
    }
}

/// Message of an error body
///
/// The platform answers `{"message": ...}` or `{"detail": ...}`; any other
/// body is kept verbatim.
fn error_message(body: &str) -> String {
    let body = body.trim();
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|value| value.get("message").or_else(|| value.get("detail")))
        .and_then(|value| value.as_str());

    match message {
        Some(message) => message.to_string(),
        None if body.is_empty() => "empty response body".to_string(),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pxl_core::domain::auth::{Credential, Environment};

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = PlatformClient::new("http://localhost:8000/", "acme", "t");
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(
            client.organization_url(),
            "http://localhost:8000/api/organization/acme"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"message": "quota exceeded"}"#), "quota exceeded");
        assert_eq!(error_message(r#"{"detail": "Not found."}"#), "Not found.");
        assert_eq!(error_message("<html>bad gateway</html>\n"), "<html>bad gateway</html>");
        assert_eq!(error_message(r#"{"code": 12}"#), r#"{"code": 12}"#);
        assert_eq!(error_message("  "), "empty response body");
    }

    #[test]
    fn test_from_auth_requires_credential() {
        let auth = AuthContext::new("acme", Environment::Local);
        let err = PlatformClient::from_auth(&auth).unwrap_err();
        assert!(matches!(
            err,
            ClientError::MissingCredential(ref key) if key == "PICSELLIA_acme_LOCAL_API_TOKEN"
        ));

        let client =
            PlatformClient::from_auth(&auth.with_credential(Credential::new("t"))).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }
}
