//! Phase domain types
//!
//! Phases are totally ordered: `init < test < smoke < deploy`. A later phase
//! relies on the side effects of earlier ones, which is tracked through
//! `ProjectState`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// One lifecycle stage of a pipeline project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Init,
    Test,
    Smoke,
    Deploy,
}

impl Phase {
    /// Every phase, in execution order
    pub const ORDER: [Phase; 4] = [Phase::Init, Phase::Test, Phase::Smoke, Phase::Deploy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Test => "test",
            Phase::Smoke => "smoke",
            Phase::Deploy => "deploy",
        }
    }

    /// The phase as a one-element slice
    pub fn as_slice(&self) -> &'static [Phase] {
        match self {
            Phase::Init => &[Phase::Init],
            Phase::Test => &[Phase::Test],
            Phase::Smoke => &[Phase::Smoke],
            Phase::Deploy => &[Phase::Deploy],
        }
    }

    /// Whether this phase needs a workspace created by an earlier `init`
    pub fn requires_workspace(&self) -> bool {
        !matches!(self, Phase::Init)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "init" => Ok(Phase::Init),
            "test" => Ok(Phase::Test),
            "smoke" | "smoke-test" | "smoke_test" => Ok(Phase::Smoke),
            "deploy" => Ok(Phase::Deploy),
            other => Err(PipelineError::Argument(format!(
                "unknown phase '{}' (expected init, test, smoke, deploy or all)",
                other
            ))),
        }
    }
}

/// Phase requested by an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseSelection {
    /// Run only this phase
    Single(Phase),
    /// Run the whole chain starting from `init`
    All,
}

impl PhaseSelection {
    /// Phases to attempt, in order
    pub fn phases(&self) -> &'static [Phase] {
        match self {
            PhaseSelection::All => &Phase::ORDER,
            PhaseSelection::Single(phase) => phase.as_slice(),
        }
    }

    pub fn includes(&self, phase: Phase) -> bool {
        self.phases().contains(&phase)
    }
}

impl fmt::Display for PhaseSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseSelection::All => f.write_str("all"),
            PhaseSelection::Single(phase) => phase.fmt(f),
        }
    }
}

impl FromStr for PhaseSelection {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(PhaseSelection::All)
        } else {
            s.parse().map(PhaseSelection::Single)
        }
    }
}

/// Lifecycle state of one project during an invocation
///
/// `Failed` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectState {
    NotStarted,
    Initialized,
    Tested,
    SmokeTested,
    Deployed,
    Failed,
}

impl ProjectState {
    /// State inferred from disk when an invocation starts
    ///
    /// A present workspace is the evidence left by a previous `init`.
    pub fn observed(workspace_exists: bool) -> Self {
        if workspace_exists {
            ProjectState::Initialized
        } else {
            ProjectState::NotStarted
        }
    }

    /// Whether `phase` may run from this state
    pub fn can_enter(&self, phase: Phase) -> bool {
        match self {
            ProjectState::Failed => false,
            ProjectState::NotStarted => !phase.requires_workspace(),
            _ => true,
        }
    }

    /// State reached after `phase` succeeds
    pub fn advance(self, phase: Phase) -> Self {
        if !self.can_enter(phase) {
            return ProjectState::Failed;
        }

        match phase {
            Phase::Init => ProjectState::Initialized,
            Phase::Test => ProjectState::Tested,
            Phase::Smoke => ProjectState::SmokeTested,
            Phase::Deploy => ProjectState::Deployed,
        }
    }
}
