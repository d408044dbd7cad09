//! Containerized smoke execution
//!
//! Builds the project image with docker or podman and runs the pipeline in
//! it. The run directory is mounted so the container reads the same
//! resolved configuration as a local run.

use async_trait::async_trait;
use pxl_core::domain::manifest::ProjectManifest;
use pxl_core::domain::project::PipelineProject;
use tokio::process::Command;
use tracing::{debug, info};

use super::{CollaboratorResult, ContainerExecutor, ExecutionContext, load_manifest, pipeline_env};
use crate::process::{run_captured, run_streaming};
use crate::settings::ContainerEngine;

/// Tag given to images built for smoke tests
const SMOKE_TAG: &str = "smoke-test";

/// Mount point of the run directory inside the container
const RUN_MOUNT: &str = "/run-config";

/// Container executor driving docker or podman
pub struct EngineContainerExecutor {
    engine: ContainerEngine,
}

impl EngineContainerExecutor {
    pub fn new(engine: ContainerEngine) -> Self {
        Self { engine }
    }

    fn image(manifest: &ProjectManifest, project: &PipelineProject) -> String {
        let name = if manifest.docker.image_name.is_empty() {
            project.name.as_str()
        } else {
            manifest.docker.image_name.as_str()
        };
        format!("{}:{}", name, SMOKE_TAG)
    }

    fn container_name(project: &PipelineProject) -> String {
        format!("pxl-smoke-{}-{}", project.pipeline_type, project.name).replace('_', "-")
    }

    /// Arguments of the `run` invocation
    fn run_args(
        &self,
        ctx: &ExecutionContext<'_>,
        manifest: &ProjectManifest,
        image: &str,
        env: &[(String, String)],
    ) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            Self::container_name(ctx.project),
            "--shm-size".to_string(),
            "8g".to_string(),
        ];
        args.extend(manifest.docker.runtime_flags());

        for (key, _) in env {
            // Values are passed through the engine's environment
            args.push("-e".to_string());
            args.push(key.clone());
        }

        args.push("-v".to_string());
        args.push(format!("{}:{}:ro", ctx.run_dir.display(), RUN_MOUNT));
        args.push(image.to_string());
        args.push("--config-file".to_string());
        args.push(format!("{}/{}", RUN_MOUNT, file_name(ctx)));
        args
    }
}

fn file_name(ctx: &ExecutionContext<'_>) -> String {
    ctx.run_config_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl ContainerExecutor for EngineContainerExecutor {
    async fn build_and_run(&self, ctx: &ExecutionContext<'_>) -> CollaboratorResult {
        let manifest = load_manifest(ctx.workspace)?;
        let env = pipeline_env(ctx.auth)?;
        let engine = self.engine.binary();
        let image = Self::image(&manifest, ctx.project);

        info!("Building {} with {}", image, engine);
        run_captured(
            Command::new(engine)
                .args(["build", "-t", image.as_str(), "."])
                .current_dir(ctx.workspace),
            &format!("{} build", engine),
        )
        .await?;

        // Leftover container from an interrupted run
        let name = Self::container_name(ctx.project);
        if run_captured(Command::new(engine).args(["rm", "-f", name.as_str()]), "cleanup")
            .await
            .is_ok()
        {
            debug!("Removed stale container {}", name);
        }

        info!("Running smoke test in {}", image);
        run_streaming(
            Command::new(engine)
                .args(self.run_args(ctx, &manifest, &image, &env))
                .envs(env)
                .current_dir(ctx.workspace),
            &format!("{} run", engine),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pxl_core::domain::auth::{AuthContext, Environment};
    use pxl_core::domain::config::RunConfiguration;
    use pxl_core::domain::manifest::{DockerSettings, ManifestMetadata};
    use pxl_core::domain::project::PipelineType;
    use std::path::Path;

    fn manifest(gpu: u32) -> ProjectManifest {
        ProjectManifest {
            metadata: ManifestMetadata {
                name: "pre_annotation".into(),
                pipeline_type: PipelineType::Processing,
                template: "pre_annotation".into(),
                version: "0.1.0".into(),
                description: String::new(),
                job_type: String::new(),
            },
            execution: Default::default(),
            docker: DockerSettings {
                image_name: "acme/pre-annotation".into(),
                gpu,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_run_args() {
        let project = PipelineProject::from_template(PipelineType::Processing, "pre_annotation");
        let auth = AuthContext::new("acme", Environment::Local);
        let config = RunConfiguration::default();
        let ctx = ExecutionContext {
            project: &project,
            workspace: Path::new("/ws/processing/pre_annotation"),
            run_dir: Path::new("/ws/processing/pre_annotation/runs/run2"),
            run_config_path: Path::new("/ws/processing/pre_annotation/runs/run2/run_config.toml"),
            config: &config,
            auth: &auth,
        };

        let executor = EngineContainerExecutor::new(ContainerEngine::Podman);
        let manifest = manifest(1);
        let image = EngineContainerExecutor::image(&manifest, &project);
        assert_eq!(image, "acme/pre-annotation:smoke-test");

        let env = vec![("API_TOKEN".to_string(), "secret".to_string())];
        let args = executor.run_args(&ctx, &manifest, &image, &env);

        assert_eq!(args[0], "run");
        assert!(args.contains(&"pxl-smoke-processing-pre-annotation".to_string()));
        assert!(args.contains(&"--gpus=all".to_string()));
        assert!(args.contains(&"API_TOKEN".to_string()));
        assert!(!args.iter().any(|a| a.contains("secret")));
        assert!(args.contains(
            &"/ws/processing/pre_annotation/runs/run2:/run-config:ro".to_string()
        ));
        assert_eq!(args.last().unwrap(), "/run-config/run_config.toml");
    }

    #[test]
    fn test_image_falls_back_to_project_name() {
        let project = PipelineProject::from_template(PipelineType::Training, "simple");
        let mut manifest = manifest(0);
        manifest.docker.image_name.clear();
        assert_eq!(
            EngineContainerExecutor::image(&manifest, &project),
            "simple:smoke-test"
        );
    }
}
