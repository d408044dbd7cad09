//! Phase command handlers
//!
//! `run` and the single-phase shortcuts all end up as one `BatchRequest`
//! executed by the batch runner.

use anyhow::{Context, Result};
use clap::Args;
use pxl_core::domain::manifest::{MANIFEST_FILE, ProjectManifest};
use pxl_core::domain::project::{PipelineType, validate_project_name};
use pxl_runner::service::Collaborators;
use pxl_runner::{BatchRequest, BatchRunner, FileSink, Reporter};
use tracing::debug;

use crate::config::Config;
use crate::console::ConsoleSink;

/// Arguments of `run`
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Pipeline type (processing or training)
    pub pipeline_type: String,

    /// Template name, or `all` for every template directory
    #[arg(short, long, default_value = "all")]
    pub template: String,

    /// Phase to reach: init, test, smoke, deploy or all
    #[arg(short, long, default_value = "all")]
    pub phase: String,

    /// Version bump used by deploy: patch, minor, major, rc or final
    #[arg(short, long, default_value = "final")]
    pub bump: String,

    /// Project name, when a single template should get a different name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Start the test phase from each project's latest run configuration
    #[arg(long)]
    pub reuse_run: bool,
}

pub async fn handle_run(args: RunArgs, config: &Config) -> Result<i32> {
    let request = BatchRequest::parse(
        &args.pipeline_type,
        &args.template,
        &args.phase,
        &args.bump,
        args.name.as_deref(),
    )?
    .with_reuse_last_run(args.reuse_run);
    execute(&request, config).await
}

pub async fn handle_init(
    pipeline_type: &str,
    template: &str,
    name: Option<&str>,
    config: &Config,
) -> Result<i32> {
    let request = BatchRequest::parse(pipeline_type, template, "init", "final", name)?;
    execute(&request, config).await
}

/// Options of the single-phase shortcuts
#[derive(Debug, Clone, Copy)]
pub struct SingleOptions<'a> {
    pub bump: &'a str,
    pub reuse_last_run: bool,
}

impl Default for SingleOptions<'_> {
    fn default() -> Self {
        Self {
            bump: "final",
            reuse_last_run: false,
        }
    }
}

/// One phase on one existing project
pub async fn handle_single(
    pipeline_type: &str,
    name: &str,
    phase: &str,
    options: SingleOptions<'_>,
    config: &Config,
) -> Result<i32> {
    let request = single_project_request(pipeline_type, name, phase, options.bump, config)?
        .with_reuse_last_run(options.reuse_last_run);
    execute(&request, config).await
}

/// Request for an existing project, keyed by the template it was made from
///
/// The template is read from the project manifest so that fixture overrides
/// are found; without a manifest the project name stands in for it.
fn single_project_request(
    pipeline_type: &str,
    name: &str,
    phase: &str,
    bump: &str,
    config: &Config,
) -> Result<BatchRequest> {
    let ty: PipelineType = pipeline_type.parse()?;
    validate_project_name(name)?;

    let manifest_path = config
        .settings
        .workspace_root
        .join(ty.as_str())
        .join(name)
        .join(MANIFEST_FILE);

    let template = std::fs::read_to_string(&manifest_path)
        .ok()
        .and_then(|content| ProjectManifest::from_toml_str(&content).ok())
        .map(|manifest| manifest.metadata.template)
        .filter(|template| !template.is_empty())
        .unwrap_or_else(|| name.to_string());
    debug!("{} uses template {}", name, template);

    let project_name = (template != name).then_some(name);
    Ok(BatchRequest::parse(
        pipeline_type,
        &template,
        phase,
        bump,
        project_name,
    )?)
}

/// Console reporter, mirrored to the report file when one is configured
pub(crate) fn reporter(config: &Config) -> Result<Reporter> {
    let mut reporter = Reporter::new().with_sink(ConsoleSink);
    if let Some(path) = config.settings.report_path() {
        let sink = FileSink::open(path)
            .with_context(|| format!("Failed to open report file {}", path.display()))?;
        reporter.add_sink(sink);
    }
    Ok(reporter)
}

async fn execute(request: &BatchRequest, config: &Config) -> Result<i32> {
    let mut reporter = reporter(config)?;
    let runner = BatchRunner::new(
        config.settings.clone(),
        Collaborators::standard(config.settings.container_engine),
        config.auth.clone(),
    );

    // A fatal error has already been written as the end of the summary
    match runner.run(request, &mut reporter).await {
        Ok(batch) => Ok(batch.exit_code()),
        Err(e) => Ok(e.exit_code()),
    }
}
