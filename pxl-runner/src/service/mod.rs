//! Collaborator layer
//!
//! The phase machine delegates the real work of each phase to a
//! collaborator: scaffolding files, running the pipeline locally, running it
//! in a container, publishing it and syncing its defaults. All collaborators
//! are trait-based so they can be swapped for stubs in tests.

mod container;
mod local;
mod publish;
mod scaffold;

use async_trait::async_trait;
use pxl_client::{Registration, SyncOutcome};
use pxl_core::domain::auth::AuthContext;
use pxl_core::domain::config::{ParamValue, RunConfiguration};
use pxl_core::domain::manifest::{MANIFEST_FILE, ProjectManifest};
use pxl_core::domain::project::{PipelineProject, PipelineType};
use pxl_core::domain::version::VersionBump;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

// Re-export implementations
pub use container::EngineContainerExecutor;
pub use local::UvLocalExecutor;
pub use publish::RegistryPublisher;
pub use scaffold::{Template, TemplateScaffolder};

/// Failure reported by a collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaboratorError {
    pub message: String,
    /// Exit status of the external tool, when one was run
    pub exit_code: Option<i32>,
}

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            exit_code: None,
        }
    }

    pub fn with_exit_code(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }
}

impl fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "{} (exit status {})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for CollaboratorError {}

pub type CollaboratorResult<T = ()> = std::result::Result<T, CollaboratorError>;

/// Everything an executor needs for one run
pub struct ExecutionContext<'a> {
    pub project: &'a PipelineProject,
    pub workspace: &'a Path,
    /// `runs/run<N>` directory holding `run_config_path`
    pub run_dir: &'a Path,
    pub run_config_path: &'a Path,
    pub config: &'a RunConfiguration,
    pub auth: &'a AuthContext,
}

/// Everything the publisher needs for one deployment
pub struct PublishRequest<'a> {
    pub project: &'a PipelineProject,
    pub workspace: &'a Path,
    pub auth: &'a AuthContext,
    pub bump: VersionBump,
    /// Typed schema defaults, registered with the pipeline
    pub default_parameters: &'a BTreeMap<String, ParamValue>,
}

/// Everything the publisher needs to push defaults to a registered pipeline
pub struct SyncRequest<'a> {
    pub project: &'a PipelineProject,
    pub workspace: &'a Path,
    pub auth: &'a AuthContext,
    pub default_parameters: &'a BTreeMap<String, ParamValue>,
}

/// What a deployment produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub version: String,
    pub tags: Vec<String>,
    pub registration: Registration,
}

/// Populates a fresh project workspace from a template
#[async_trait]
pub trait Scaffolder: Send + Sync {
    /// Whether the template exists for this pipeline type
    fn has_template(&self, pipeline_type: PipelineType, template: &str) -> bool;

    /// Writes the project files into `workspace`
    async fn generate(&self, project: &PipelineProject, workspace: &Path) -> CollaboratorResult;
}

/// Runs a pipeline on the host against the real backend
#[async_trait]
pub trait LocalExecutor: Send + Sync {
    async fn run(&self, ctx: &ExecutionContext<'_>) -> CollaboratorResult;
}

/// Builds the project image and runs the pipeline inside it
#[async_trait]
pub trait ContainerExecutor: Send + Sync {
    async fn build_and_run(&self, ctx: &ExecutionContext<'_>) -> CollaboratorResult;
}

/// Builds, tags, pushes and registers a pipeline
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn build_push_register(
        &self,
        req: &PublishRequest<'_>,
    ) -> CollaboratorResult<PublishOutcome>;

    /// Replaces the default parameters of the registered pipeline
    async fn sync_parameters(&self, req: &SyncRequest<'_>) -> CollaboratorResult<SyncOutcome>;
}

/// The set of collaborators a phase machine drives
#[derive(Clone)]
pub struct Collaborators {
    pub scaffolder: Arc<dyn Scaffolder>,
    pub local: Arc<dyn LocalExecutor>,
    pub container: Arc<dyn ContainerExecutor>,
    pub publisher: Arc<dyn Publisher>,
}

impl Collaborators {
    /// Default, process-based collaborators
    pub fn standard(engine: crate::settings::ContainerEngine) -> Self {
        Self {
            scaffolder: Arc::new(TemplateScaffolder::new()),
            local: Arc::new(UvLocalExecutor::new()),
            container: Arc::new(EngineContainerExecutor::new(engine)),
            publisher: Arc::new(RegistryPublisher::new(engine)),
        }
    }
}

/// Reads a project manifest
pub(crate) fn load_manifest(workspace: &Path) -> CollaboratorResult<ProjectManifest> {
    let path = workspace.join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| CollaboratorError::new(format!("cannot read {}: {}", path.display(), e)))?;
    ProjectManifest::from_toml_str(&content)
        .map_err(|e| CollaboratorError::new(format!("invalid {}: {}", path.display(), e.message())))
}

/// Environment handed to pipeline processes
///
/// Fails when the credential was not provided, since pipeline runs act on
/// the remote platform.
pub(crate) fn pipeline_env(auth: &AuthContext) -> CollaboratorResult<Vec<(String, String)>> {
    if auth.organization.trim().is_empty() {
        return Err(CollaboratorError::new(
            "no organization set; pass --organization or set PXL_ORGANIZATION",
        ));
    }

    let credential = auth.credential.as_ref().ok_or_else(|| {
        CollaboratorError::new(format!(
            "no API token for organization '{}' ({}); set {}",
            auth.organization,
            auth.environment,
            auth.token_env_key()
        ))
    })?;

    Ok(vec![
        ("API_TOKEN".to_string(), credential.expose().to_string()),
        ("ORGANIZATION_NAME".to_string(), auth.organization.clone()),
        ("HOST".to_string(), auth.host().to_string()),
    ])
}
