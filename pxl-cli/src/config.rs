//! Configuration module
//!
//! Global flags, layered over the `PXL_*` environment, and the auth context
//! resolved once per invocation.

use anyhow::Result;
use clap::Args;
use pxl_core::domain::auth::{AuthContext, Credential, Environment};
use pxl_runner::Settings;
use std::path::PathBuf;

/// Flags shared by every command
///
/// Flags win over the environment; the environment wins over defaults.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Root holding one workspace per project
    #[arg(long, global = true)]
    pub workspace_root: Option<PathBuf>,

    /// Root of per-template fixtures
    #[arg(long, global = true)]
    pub templates_root: Option<PathBuf>,

    /// Container engine for smoke tests and deployments (docker or podman)
    #[arg(long, global = true)]
    pub container_engine: Option<String>,

    /// Append the report to this file
    #[arg(long, global = true)]
    pub report_path: Option<PathBuf>,

    /// Platform organization
    #[arg(long, env = "PXL_ORGANIZATION", global = true)]
    pub organization: Option<String>,

    /// Platform environment (PROD, STAGING or LOCAL)
    #[arg(long = "env", env = "PXL_ENVIRONMENT", global = true)]
    pub environment: Option<String>,
}

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub auth: AuthContext,
}

impl Config {
    /// Resolves settings and auth from flags and the process environment
    pub fn load(args: &GlobalArgs) -> Result<Self> {
        Self::load_with(args, |key| std::env::var(key).ok())
    }

    /// Same as `load`, with an arbitrary variable lookup
    pub fn load_with<F>(args: &GlobalArgs, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::from_lookup(&lookup)?;

        if let Some(root) = &args.workspace_root {
            settings.workspace_root = root.clone();
        }
        if let Some(root) = &args.templates_root {
            settings.templates_root = root.clone();
        }
        if let Some(engine) = &args.container_engine {
            settings.container_engine = engine.parse()?;
        }
        if let Some(path) = &args.report_path {
            settings = settings.with_report_path(path);
        }
        settings.validate()?;

        let environment = match &args.environment {
            Some(env) => env.parse()?,
            None => Environment::default(),
        };
        let organization = args.organization.clone().unwrap_or_default();
        let auth = resolve_auth(organization, environment, &lookup);

        Ok(Self { settings, auth })
    }
}

/// Builds the auth context, reading the token once
///
/// A missing token is not an error here; only the phases that talk to the
/// platform need it.
fn resolve_auth<F>(organization: String, environment: Environment, lookup: F) -> AuthContext
where
    F: Fn(&str) -> Option<String>,
{
    let auth = AuthContext::new(organization, environment);
    if auth.organization.is_empty() {
        return auth;
    }

    match lookup(&auth.token_env_key()).filter(|t| !t.trim().is_empty()) {
        Some(token) => auth.with_credential(Credential::new(token)),
        None => auth,
    }
}
