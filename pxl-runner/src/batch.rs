//! Batch runner
//!
//! Resolves a project selector into an ordered list of projects, runs the
//! phase machine for each of them and aggregates the results. A failing
//! project never stops the batch; only invocation-fatal errors do.
//!
//! Parameter schemas of existing workspaces are checked before the first
//! project is touched, so an invalid schema aborts a batch that has not
//! started yet.

use pxl_core::domain::auth::AuthContext;
use pxl_core::domain::phase::{Phase, PhaseSelection};
use pxl_core::domain::project::{PipelineProject, PipelineType, validate_project_name};
use pxl_core::domain::result::{BatchRun, PhaseResult, ReasonCode};
use pxl_core::domain::version::VersionBump;
use pxl_core::{PipelineError, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::machine::{PhaseMachine, PhaseRequest};
use crate::report::Reporter;
use crate::resolver;
use crate::service::Collaborators;
use crate::settings::Settings;
use crate::workspace::{WorkspaceManager, subdirectory_names};

/// Marker file opting a template out of batch runs
const SKIP_MARKER: &str = ".skip";

/// Which projects an invocation targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectSelector {
    Named(String),
    /// Every template directory of the type
    All,
}

impl fmt::Display for ProjectSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectSelector::Named(name) => f.write_str(name),
            ProjectSelector::All => f.write_str("all"),
        }
    }
}

impl FromStr for ProjectSelector {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "all" {
            return Ok(ProjectSelector::All);
        }
        validate_project_name(s)?;
        Ok(ProjectSelector::Named(s.to_string()))
    }
}

/// A validated invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub pipeline_type: PipelineType,
    pub selector: ProjectSelector,
    /// Project name when it differs from the template name
    pub project_name: Option<String>,
    pub selection: PhaseSelection,
    pub bump: VersionBump,
    /// `test` starts from each project's latest run configuration
    pub reuse_last_run: bool,
}

impl BatchRequest {
    /// Validates raw invocation arguments
    ///
    /// Pure: nothing on disk is looked at, so a malformed invocation fails
    /// before any workspace is touched.
    pub fn parse(
        pipeline_type: &str,
        template: &str,
        phase: &str,
        bump: &str,
        project_name: Option<&str>,
    ) -> Result<Self> {
        let pipeline_type: PipelineType = pipeline_type.parse()?;
        let selector: ProjectSelector = template.parse()?;
        let selection: PhaseSelection = phase.parse()?;
        let bump: VersionBump = bump.parse()?;

        let project_name = match project_name {
            None => None,
            Some(_) if selector == ProjectSelector::All => {
                return Err(PipelineError::Argument(
                    "a project name cannot be given together with template 'all'".to_string(),
                ));
            }
            Some(name) => {
                validate_project_name(name)?;
                Some(name.to_string())
            }
        };

        Ok(Self {
            pipeline_type,
            selector,
            project_name,
            selection,
            bump,
            reuse_last_run: false,
        })
    }

    pub fn with_reuse_last_run(mut self, reuse: bool) -> Self {
        self.reuse_last_run = reuse;
        self
    }
}

/// A project picked by the selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedProject {
    pub project: PipelineProject,
    pub override_file: PathBuf,
    /// Template opted out of `all` with a skip marker
    pub skipped: bool,
}

/// Runs the phase machine over a selection of projects
pub struct BatchRunner {
    settings: Settings,
    machine: PhaseMachine,
}

impl BatchRunner {
    pub fn new(settings: Settings, collaborators: Collaborators, auth: AuthContext) -> Self {
        let workspace = WorkspaceManager::new(settings.workspace_root.clone());
        Self {
            machine: PhaseMachine::new(workspace, collaborators, auth),
            settings,
        }
    }

    /// Template directories of a type, in lexicographic order
    ///
    /// A missing templates directory holds no templates.
    pub fn discover_templates(&self, pipeline_type: PipelineType) -> Result<Vec<String>> {
        let dir = self.settings.templates_dir(pipeline_type);
        if !dir.is_dir() {
            warn!("Templates directory {} not found", dir.display());
        }
        subdirectory_names(&dir)
    }

    /// Projects targeted by a request, in processing order
    pub fn select(&self, request: &BatchRequest) -> Result<Vec<SelectedProject>> {
        let ty = request.pipeline_type;

        let projects: Vec<PipelineProject> = match &request.selector {
            ProjectSelector::All => self
                .discover_templates(ty)?
                .into_iter()
                .map(|template| PipelineProject::from_template(ty, template))
                .collect(),
            ProjectSelector::Named(template) => {
                let name = request.project_name.as_deref().unwrap_or(template);
                vec![PipelineProject::new(name, ty, template.as_str())]
            }
        };

        let batch = request.selector == ProjectSelector::All;

        Ok(projects
            .into_iter()
            .map(|project| {
                let template_dir = self.settings.template_dir(ty, &project.template_name);
                SelectedProject {
                    override_file: self.settings.override_file(ty, &project.template_name),
                    skipped: batch && template_dir.join(SKIP_MARKER).exists(),
                    project,
                }
            })
            .collect())
    }

    /// Validates the schema of every existing workspace the batch will use
    ///
    /// A selection starting at `init` rewrites the schema from the template,
    /// so there is nothing to check up front. Only invocation-fatal errors
    /// are returned; anything else is left for the phase to report.
    pub fn check_schemas(
        &self,
        request: &BatchRequest,
        selected: &[SelectedProject],
    ) -> Result<()> {
        if request.selection.includes(Phase::Init) {
            return Ok(());
        }

        for entry in selected.iter().filter(|entry| !entry.skipped) {
            let dir = self.machine.workspace().project_dir(&entry.project);
            if !dir.is_dir() {
                continue;
            }

            let checked = resolver::schema_path(&dir)
                .and_then(|path| resolver::load_schema(&path))
                .and_then(|schema| schema.defaults());
            match checked {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!("{}: {}", entry.project.display_name(), e),
            }
        }
        Ok(())
    }

    /// Runs a batch
    ///
    /// Returns `Err` only for invocation-fatal errors. The summary is the
    /// last thing written to the reporter, on the error path as well.
    pub async fn run(&self, request: &BatchRequest, reporter: &mut Reporter) -> Result<BatchRun> {
        let mut batch = BatchRun::new();
        let selected = self.select(request)?;
        info!(
            "Selected {} project(s) for phase {}",
            selected.len(),
            request.selection
        );

        reporter.section(format!(
            "{} {} (phase {})",
            request.pipeline_type, request.selector, request.selection
        ));

        if let Err(e) = self.check_schemas(request, &selected) {
            batch.finish();
            reporter.abort_summary(&batch, &e);
            return Err(e);
        }

        for entry in selected {
            if entry.skipped {
                reporter.warning(format!(
                    "{} skipped ({} marker)",
                    entry.project.display_name(),
                    SKIP_MARKER
                ));
                batch.push(PhaseResult::skipped(&entry.project, ReasonCode::OptedOut));
                continue;
            }

            let phase_request = PhaseRequest::new(entry.project, request.selection)
                .with_bump(request.bump)
                .with_override(entry.override_file)
                .with_reuse_last_run(request.reuse_last_run);

            match self.machine.run(&phase_request, reporter).await {
                Ok(result) => {
                    debug!("{} -> {:?}", result.display_name, result.status);
                    batch.push(result);
                }
                Err(e) => {
                    warn!(
                        "Aborting batch at {}: {}",
                        phase_request.project.display_name(),
                        e
                    );
                    batch.finish();
                    reporter.abort_summary(&batch, &e);
                    return Err(e);
                }
            }
        }

        batch.finish();
        reporter.summary(&batch);
        Ok(batch)
    }
}
