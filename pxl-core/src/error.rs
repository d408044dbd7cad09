//! Error taxonomy for pipeline orchestration

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::config::ParamType;
use crate::domain::phase::Phase;
use crate::domain::project::PipelineType;
use crate::domain::result::{EXIT_ARGUMENT_ERROR, EXIT_FAILURE, EXIT_SCHEMA_ERROR, ReasonCode};

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while driving a pipeline project through its phases
///
/// `Argument` and `Schema` abort the whole invocation. Every other variant is
/// scoped to a single project and ends up recorded in its `PhaseResult`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed invocation, detected before any side effect
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Parameter schema is invalid independently of any run
    #[error("invalid parameter schema: {0}")]
    Schema(String),

    /// A configuration value cannot be converted to its declared type
    #[error("parameter '{name}' expects a {expected} value, got {value}")]
    TypeMismatch {
        /// Parameter name
        name: String,
        /// Declared type
        expected: ParamType,
        /// Offending raw value, rendered as TOML
        value: String,
    },

    /// The requested template does not exist
    #[error("unknown {pipeline_type} template '{template}'")]
    MissingTemplate {
        pipeline_type: PipelineType,
        template: String,
    },

    /// The project has no run configuration file
    #[error("run configuration not found at {}", path.display())]
    MissingRunConfig { path: PathBuf },

    /// The run configuration file exists but cannot be interpreted
    #[error("run configuration {} is malformed: {message}", path.display())]
    MalformedRunConfig { path: PathBuf, message: String },

    /// A phase was run before its prerequisite created the workspace
    #[error("workspace for '{project}' not found at {}; run phase init first", path.display())]
    MissingWorkspace { project: String, path: PathBuf },

    /// An override file is present but could not be copied
    #[error("failed to apply configuration override {}: {source}", path.display())]
    ConfigOverride {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An external collaborator reported failure
    #[error("{phase} phase failed: {message}")]
    PhaseExecution { phase: Phase, message: String },

    /// The shared workspace root cannot be entered or used
    #[error("cannot use workspace root {}: {message}", path.display())]
    WorkspaceAccess { path: PathBuf, message: String },

    /// Pushing schema defaults to the registered pipeline failed
    #[error("failed to sync '{project}': {message}")]
    Sync { project: String, message: String },
}

impl PipelineError {
    /// Create a phase execution error
    pub fn phase(phase: Phase, message: impl Into<String>) -> Self {
        Self::PhaseExecution {
            phase,
            message: message.into(),
        }
    }

    /// Create a workspace access error
    pub fn workspace_access(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::WorkspaceAccess {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Reason code recorded in reports for this error
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Self::Argument(_) => ReasonCode::Argument,
            Self::Schema(_) => ReasonCode::Schema,
            Self::TypeMismatch { .. } => ReasonCode::TypeMismatch,
            Self::MissingTemplate { .. } => ReasonCode::MissingTemplate,
            Self::MissingRunConfig { .. } => ReasonCode::MissingRunConfig,
            Self::MalformedRunConfig { .. } => ReasonCode::MalformedRunConfig,
            Self::MissingWorkspace { .. } => ReasonCode::MissingWorkspace,
            Self::ConfigOverride { .. } => ReasonCode::ConfigOverride,
            Self::PhaseExecution { phase, .. } => ReasonCode::phase_failed(*phase),
            Self::WorkspaceAccess { .. } => ReasonCode::WorkspaceAccess,
            Self::Sync { .. } => ReasonCode::SyncFailed,
        }
    }

    /// Check if this error aborts the whole invocation
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Argument(_) | Self::Schema(_))
    }

    /// Process exit code for an invocation that ended with this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Argument(_) => EXIT_ARGUMENT_ERROR,
            Self::Schema(_) => EXIT_SCHEMA_ERROR,
            _ => EXIT_FAILURE,
        }
    }
}
