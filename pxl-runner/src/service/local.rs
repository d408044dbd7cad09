//! Local execution through `uv`
//!
//! Creates the project's virtual environment on first use, installs its
//! requirements, then runs the pipeline script with the run configuration.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::info;

use super::{CollaboratorResult, ExecutionContext, LocalExecutor, load_manifest, pipeline_env};
use crate::process::{run_captured, run_streaming};

const VENV_DIR: &str = ".venv";

/// Local executor backed by `uv`
pub struct UvLocalExecutor {
    uv: String,
}

impl UvLocalExecutor {
    pub fn new() -> Self {
        Self {
            uv: "uv".to_string(),
        }
    }

    fn python(workspace: &Path) -> PathBuf {
        workspace.join(VENV_DIR).join("bin").join("python")
    }

    async fn ensure_venv(&self, workspace: &Path, requirements: &str) -> CollaboratorResult {
        if !workspace.join(VENV_DIR).is_dir() {
            info!("Creating virtual environment in {}", workspace.display());
            run_captured(
                Command::new(&self.uv).arg("venv").current_dir(workspace),
                "uv venv",
            )
            .await?;
        }

        info!("Installing {}", requirements);
        let python = Self::python(workspace);
        run_captured(
            Command::new(&self.uv)
                .args(["pip", "install", "--python"])
                .arg(&python)
                .arg("-r")
                .arg(requirements)
                .current_dir(workspace),
            "uv pip install",
        )
        .await?;

        Ok(())
    }
}

impl Default for UvLocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalExecutor for UvLocalExecutor {
    async fn run(&self, ctx: &ExecutionContext<'_>) -> CollaboratorResult {
        let manifest = load_manifest(ctx.workspace)?;
        let env = pipeline_env(ctx.auth)?;

        self.ensure_venv(ctx.workspace, &manifest.execution.requirements_file)
            .await?;

        info!(
            "Running {} for {} (run dir {})",
            manifest.execution.pipeline_script,
            ctx.project.display_name(),
            ctx.run_dir.display()
        );

        run_streaming(
            Command::new(Self::python(ctx.workspace))
                .arg(&manifest.execution.pipeline_script)
                .arg("--config-file")
                .arg(ctx.run_config_path)
                .envs(env)
                .env("PYTHONPATH", ctx.workspace)
                .current_dir(ctx.workspace),
            "pipeline run",
        )
        .await
    }
}
