//! Authentication context
//!
//! Organization, environment and credential are resolved once per
//! invocation and passed through to the collaborators. The orchestrator
//! never looks inside the credential.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// Platform environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    #[default]
    Prod,
    Staging,
    Local,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Prod => "PROD",
            Environment::Staging => "STAGING",
            Environment::Local => "LOCAL",
        }
    }

    /// Platform host for this environment
    pub fn url(&self) -> &'static str {
        match self {
            Environment::Prod => "https://app.picsellia.com",
            Environment::Staging => "https://staging.picsellia.com",
            Environment::Local => "http://localhost:8000",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PROD" => Ok(Environment::Prod),
            "STAGING" => Ok(Environment::Staging),
            "LOCAL" => Ok(Environment::Local),
            other => Err(PipelineError::Argument(format!(
                "invalid environment '{}' (expected PROD, STAGING or LOCAL)",
                other
            ))),
        }
    }
}

/// API token; never printed
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Ambient authentication inputs for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub organization: String,
    pub environment: Environment,
    pub credential: Option<Credential>,
}

impl AuthContext {
    pub fn new(organization: impl Into<String>, environment: Environment) -> Self {
        Self {
            organization: organization.into(),
            environment,
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Environment variable holding the token for this organization and environment
    pub fn token_env_key(&self) -> String {
        format!(
            "PICSELLIA_{}_{}_API_TOKEN",
            self.organization, self.environment
        )
    }

    pub fn host(&self) -> &'static str {
        self.environment.url()
    }
}
