//! Phase state machine
//!
//! Drives one project through the requested phases. The phases of a
//! selection are folded in order and the fold stops at the first failure.
//! Project-scoped errors end up in the returned `PhaseResult`; only
//! invocation-fatal errors (`Argument`, `Schema`) come back as `Err`.

use pxl_client::SyncOutcome;
use pxl_core::domain::auth::AuthContext;
use pxl_core::domain::manifest::RUN_CONFIG_FILE;
use pxl_core::domain::phase::{Phase, PhaseSelection, ProjectState};
use pxl_core::domain::project::PipelineProject;
use pxl_core::domain::result::PhaseResult;
use pxl_core::domain::version::VersionBump;
use pxl_core::{PipelineError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::report::Reporter;
use crate::resolver::{self, Resolved};
use crate::runs;
use crate::service::{
    CollaboratorError, Collaborators, ExecutionContext, PublishRequest, SyncRequest,
};
use crate::workspace::{OverrideOutcome, WorkspaceGuard, WorkspaceHandle, WorkspaceManager};

/// One project's phase request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseRequest {
    pub project: PipelineProject,
    pub selection: PhaseSelection,
    /// Only consulted by `deploy`
    pub bump: VersionBump,
    /// Override configuration candidate; may not exist
    pub override_file: Option<PathBuf>,
    /// `test` starts from the configuration of the latest run, when there is one
    pub reuse_last_run: bool,
}

impl PhaseRequest {
    pub fn new(project: PipelineProject, selection: PhaseSelection) -> Self {
        Self {
            project,
            selection,
            bump: VersionBump::default(),
            override_file: None,
            reuse_last_run: false,
        }
    }

    pub fn with_bump(mut self, bump: VersionBump) -> Self {
        self.bump = bump;
        self
    }

    pub fn with_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_file = Some(path.into());
        self
    }

    pub fn with_reuse_last_run(mut self, reuse: bool) -> Self {
        self.reuse_last_run = reuse;
        self
    }
}

/// State shared by the phase handlers of one run
struct PhaseContext<'a> {
    request: &'a PhaseRequest,
    guard: &'a WorkspaceGuard<'a>,
}

/// Sequencer of the `init -> test -> smoke -> deploy` chain
pub struct PhaseMachine {
    workspace: WorkspaceManager,
    collaborators: Collaborators,
    auth: AuthContext,
}

impl PhaseMachine {
    pub fn new(
        workspace: WorkspaceManager,
        collaborators: Collaborators,
        auth: AuthContext,
    ) -> Self {
        Self {
            workspace,
            collaborators,
            auth,
        }
    }

    pub fn workspace(&self) -> &WorkspaceManager {
        &self.workspace
    }

    /// Runs the requested phases for one project
    ///
    /// The workspace root is entered once for the whole chain and left on
    /// every exit path.
    pub async fn run(
        &self,
        request: &PhaseRequest,
        reporter: &mut Reporter,
    ) -> Result<PhaseResult> {
        let project = &request.project;
        let phases = request.selection.phases();
        let mut last = phases.first().copied().unwrap_or(Phase::Init);

        let guard = match self.workspace.enter() {
            Ok(guard) => guard,
            Err(e) => {
                reporter.error(format!("{}: {}", project.display_name(), e));
                return Ok(PhaseResult::failed(project, last, &e));
            }
        };

        let ctx = PhaseContext {
            request,
            guard: &guard,
        };
        let mut state = ProjectState::observed(self.workspace.exists(project));
        debug!(
            "{} starts in state {:?} under {}",
            project.display_name(),
            state,
            guard.root().display()
        );

        for &phase in phases {
            last = phase;
            reporter.info(format!("{} > {}", project.display_name(), phase));

            let outcome = if state.can_enter(phase) {
                self.handle(phase, &ctx, reporter).await
            } else {
                Err(PipelineError::MissingWorkspace {
                    project: project.display_name(),
                    path: guard.project_dir(project),
                })
            };

            match outcome {
                Ok(()) => {
                    state = state.advance(phase);
                    reporter.success(format!("{} {} passed", project.display_name(), phase));
                }
                Err(e) if e.is_fatal() => {
                    reporter.error(format!("{} {}: {}", project.display_name(), phase, e));
                    return Err(e);
                }
                Err(e) => {
                    reporter.error(format!("{} {} failed: {}", project.display_name(), phase, e));
                    return Ok(PhaseResult::failed(project, phase, &e));
                }
            }
        }

        info!("{} reached {:?}", project.display_name(), state);
        Ok(PhaseResult::succeeded(project, last))
    }

    /// Pushes the schema defaults of an existing project to its registered
    /// pipeline
    ///
    /// Nothing is built and the manifest is left alone. A pipeline that was
    /// never deployed is reported as `NotRegistered`.
    pub async fn sync(
        &self,
        project: &PipelineProject,
        reporter: &mut Reporter,
    ) -> Result<SyncOutcome> {
        let guard = self.workspace.enter()?;
        let handle = guard.prepare(project, Phase::Deploy)?;
        let schema = resolver::load_schema(&resolver::schema_path(&handle.path)?)?;
        let defaults = schema.defaults()?;

        let req = SyncRequest {
            project,
            workspace: &handle.path,
            auth: &self.auth,
            default_parameters: &defaults,
        };

        let outcome = self
            .collaborators
            .publisher
            .sync_parameters(&req)
            .await
            .map_err(|e| PipelineError::Sync {
                project: project.display_name(),
                message: e.to_string(),
            })?;

        match outcome {
            SyncOutcome::Synced => reporter.success(format!(
                "{}: {} default parameter(s) synced",
                project.display_name(),
                defaults.len()
            )),
            SyncOutcome::NotRegistered => reporter.warning(format!(
                "{} is not registered yet; run phase deploy first",
                project.display_name()
            )),
        }
        Ok(outcome)
    }

    async fn handle(
        &self,
        phase: Phase,
        ctx: &PhaseContext<'_>,
        reporter: &mut Reporter,
    ) -> Result<()> {
        match phase {
            Phase::Init => self.init(ctx, reporter).await,
            Phase::Test => self.test(ctx, reporter).await,
            Phase::Smoke => self.smoke(ctx, reporter).await,
            Phase::Deploy => self.deploy(ctx, reporter).await,
        }
    }

    async fn init(&self, ctx: &PhaseContext<'_>, reporter: &mut Reporter) -> Result<()> {
        let project = &ctx.request.project;
        let scaffolder = &self.collaborators.scaffolder;

        // Checked first so a bad template never deletes an existing workspace
        if !scaffolder.has_template(project.pipeline_type, &project.template_name) {
            return Err(PipelineError::MissingTemplate {
                pipeline_type: project.pipeline_type,
                template: project.template_name.clone(),
            });
        }

        let handle = ctx.guard.prepare(project, Phase::Init)?;
        scaffolder
            .generate(project, &handle.path)
            .await
            .map_err(|e| phase_error(Phase::Init, e))?;
        reporter.info(format!("Workspace ready at {}", handle.path.display()));

        self.apply_override(ctx, &handle, reporter)
    }

    async fn test(&self, ctx: &PhaseContext<'_>, reporter: &mut Reporter) -> Result<()> {
        let handle = ctx.guard.prepare(&ctx.request.project, Phase::Test)?;
        let source = test_source(ctx.request, &handle);
        if source != handle.run_config() {
            reporter.info(format!("Reusing configuration {}", source.display()));
        }
        let resolved = resolve(&handle, &source, reporter)?;
        let run_dir = runs::next_run_dir(&handle.path)?;
        let run_config_path = runs::write_run_config(&run_dir, &resolved.config)?;

        let exec = ExecutionContext {
            project: &ctx.request.project,
            workspace: &handle.path,
            run_dir: &run_dir,
            run_config_path: &run_config_path,
            config: &resolved.config,
            auth: &self.auth,
        };

        self.collaborators
            .local
            .run(&exec)
            .await
            .map_err(|e| phase_error(Phase::Test, e))
    }

    async fn smoke(&self, ctx: &PhaseContext<'_>, reporter: &mut Reporter) -> Result<()> {
        let handle = ctx.guard.prepare(&ctx.request.project, Phase::Smoke)?;
        self.apply_override(ctx, &handle, reporter)?;

        let resolved = resolve(&handle, &handle.run_config(), reporter)?;
        let run_dir = runs::next_run_dir(&handle.path)?;
        let run_config_path = runs::write_run_config(&run_dir, &resolved.config)?;

        let exec = ExecutionContext {
            project: &ctx.request.project,
            workspace: &handle.path,
            run_dir: &run_dir,
            run_config_path: &run_config_path,
            config: &resolved.config,
            auth: &self.auth,
        };

        self.collaborators
            .container
            .build_and_run(&exec)
            .await
            .map_err(|e| phase_error(Phase::Smoke, e))
    }

    async fn deploy(&self, ctx: &PhaseContext<'_>, reporter: &mut Reporter) -> Result<()> {
        let handle = ctx.guard.prepare(&ctx.request.project, Phase::Deploy)?;
        let schema = resolver::load_schema(&resolver::schema_path(&handle.path)?)?;
        let defaults = schema.defaults()?;

        let req = PublishRequest {
            project: &ctx.request.project,
            workspace: &handle.path,
            auth: &self.auth,
            bump: ctx.request.bump,
            default_parameters: &defaults,
        };

        let outcome = self
            .collaborators
            .publisher
            .build_push_register(&req)
            .await
            .map_err(|e| phase_error(Phase::Deploy, e))?;

        reporter.info(format!(
            "Published version {} (tags: {}), pipeline {}",
            outcome.version,
            outcome.tags.join(", "),
            outcome.registration
        ));
        Ok(())
    }

    fn apply_override(
        &self,
        ctx: &PhaseContext<'_>,
        handle: &WorkspaceHandle,
        reporter: &mut Reporter,
    ) -> Result<()> {
        match ctx
            .guard
            .apply_override(handle, ctx.request.override_file.as_deref())?
        {
            OverrideOutcome::Applied(source) => {
                reporter.info(format!("Applied configuration override {}", source.display()));
            }
            OverrideOutcome::Absent => debug!("No configuration override"),
        }
        Ok(())
    }
}

/// Run configuration the `test` phase starts from
fn test_source(request: &PhaseRequest, handle: &WorkspaceHandle) -> PathBuf {
    if request.reuse_last_run {
        if let Some(run_dir) = runs::latest_run_dir(&handle.path) {
            let previous = run_dir.join(RUN_CONFIG_FILE);
            if previous.is_file() {
                return previous;
            }
        }
        debug!("No previous run for {}", handle.project.display_name());
    }
    handle.run_config()
}

fn resolve(handle: &WorkspaceHandle, source: &Path, reporter: &mut Reporter) -> Result<Resolved> {
    let resolved = resolver::resolve_file(&handle.path, source)?;
    for warning in &resolved.warnings {
        reporter.warning(format!("{}: {}", handle.project.display_name(), warning));
    }
    Ok(resolved)
}

fn phase_error(phase: Phase, error: CollaboratorError) -> PipelineError {
    PipelineError::phase(phase, error.to_string())
}
