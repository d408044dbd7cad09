//! Phase and batch result types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::phase::Phase;
use crate::domain::project::PipelineProject;
use crate::error::PipelineError;

/// Exit code of a batch without failures (including an empty batch)
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code of a batch where at least one project failed
pub const EXIT_FAILURE: i32 = 1;
/// Exit code of a malformed invocation
pub const EXIT_ARGUMENT_ERROR: i32 = 2;
/// Exit code of an invocation aborted by an invalid parameter schema
pub const EXIT_SCHEMA_ERROR: i32 = 3;

/// Outcome status of a phase chain for one project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Success,
    Failure,
    Skipped,
}

/// Why a phase chain ended the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasonCode {
    Completed,
    OptedOut,
    Argument,
    Schema,
    TypeMismatch,
    MissingTemplate,
    MissingRunConfig,
    MalformedRunConfig,
    MissingWorkspace,
    ConfigOverride,
    InitFailed,
    TestFailed,
    SmokeFailed,
    DeployFailed,
    WorkspaceAccess,
    SyncFailed,
}

impl ReasonCode {
    /// Phase-qualified execution failure
    pub fn phase_failed(phase: Phase) -> Self {
        match phase {
            Phase::Init => ReasonCode::InitFailed,
            Phase::Test => ReasonCode::TestFailed,
            Phase::Smoke => ReasonCode::SmokeFailed,
            Phase::Deploy => ReasonCode::DeployFailed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Completed => "completed",
            ReasonCode::OptedOut => "opted-out",
            ReasonCode::Argument => "argument",
            ReasonCode::Schema => "schema",
            ReasonCode::TypeMismatch => "type-mismatch",
            ReasonCode::MissingTemplate => "missing-template",
            ReasonCode::MissingRunConfig => "missing-run-config",
            ReasonCode::MalformedRunConfig => "malformed-run-config",
            ReasonCode::MissingWorkspace => "missing-workspace",
            ReasonCode::ConfigOverride => "config-override",
            ReasonCode::InitFailed => "init-failed",
            ReasonCode::TestFailed => "test-failed",
            ReasonCode::SmokeFailed => "smoke-failed",
            ReasonCode::DeployFailed => "deploy-failed",
            ReasonCode::WorkspaceAccess => "workspace-access",
            ReasonCode::SyncFailed => "sync-failed",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of running a phase chain for one project
///
/// Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseResult {
    /// `type/name`
    pub display_name: String,
    /// Last attempted phase, if any
    pub phase: Option<Phase>,
    pub status: PhaseStatus,
    pub reason_code: ReasonCode,
    pub message: Option<String>,
}

impl PhaseResult {
    pub fn succeeded(project: &PipelineProject, phase: Phase) -> Self {
        Self {
            display_name: project.display_name(),
            phase: Some(phase),
            status: PhaseStatus::Success,
            reason_code: ReasonCode::Completed,
            message: None,
        }
    }

    pub fn failed(project: &PipelineProject, phase: Phase, error: &PipelineError) -> Self {
        Self {
            display_name: project.display_name(),
            phase: Some(phase),
            status: PhaseStatus::Failure,
            reason_code: error.reason_code(),
            message: Some(error.to_string()),
        }
    }

    pub fn skipped(project: &PipelineProject, reason_code: ReasonCode) -> Self {
        Self {
            display_name: project.display_name(),
            phase: None,
            status: PhaseStatus::Skipped,
            reason_code,
            message: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == PhaseStatus::Failure
    }
}

/// All results of one invocation
///
/// Grows monotonically while projects are processed; the exit code is a
/// pure function of `any_failure`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRun {
    pub results: Vec<PhaseResult>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl BatchRun {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            started_at: chrono::Utc::now(),
            finished_at: None,
        }
    }

    pub fn push(&mut self, result: PhaseResult) {
        self.results.push(result);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(chrono::Utc::now());
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn any_failure(&self) -> bool {
        self.results.iter().any(PhaseResult::is_failure)
    }

    pub fn exit_code(&self) -> i32 {
        if self.any_failure() {
            EXIT_FAILURE
        } else {
            EXIT_SUCCESS
        }
    }
}

impl Default for BatchRun {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::project::PipelineType;

    fn project(name: &str) -> PipelineProject {
        PipelineProject::from_template(PipelineType::Processing, name)
    }

    #[test]
    fn test_empty_batch_succeeds() {
        let mut batch = BatchRun::new();
        batch.finish();
        assert!(batch.is_empty());
        assert!(!batch.any_failure());
        assert_eq!(batch.exit_code(), EXIT_SUCCESS);
    }

    #[test]
    fn test_any_failure_drives_exit_code() {
        let mut batch = BatchRun::new();
        batch.push(PhaseResult::succeeded(&project("a"), Phase::Deploy));
        batch.push(PhaseResult::skipped(&project("b"), ReasonCode::OptedOut));
        assert_eq!(batch.exit_code(), EXIT_SUCCESS);

        let err = PipelineError::phase(Phase::Init, "scaffolding failed");
        batch.push(PhaseResult::failed(&project("c"), Phase::Init, &err));
        assert!(batch.any_failure());
        assert_eq!(batch.exit_code(), EXIT_FAILURE);
        assert_eq!(batch.results.iter().filter(|r| r.is_failure()).count(), 1);
    }

    #[test]
    fn test_failed_result_keeps_reason() {
        let err = PipelineError::phase(Phase::Test, "exit status 1");
        let result = PhaseResult::failed(&project("simple"), Phase::Test, &err);
        assert_eq!(result.display_name, "processing/simple");
        assert_eq!(result.reason_code, ReasonCode::TestFailed);
        assert_eq!(result.reason_code.to_string(), "test-failed");
        assert!(result.message.unwrap().contains("exit status 1"));
    }
}
