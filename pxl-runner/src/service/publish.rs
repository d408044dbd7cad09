//! Publishing
//!
//! Bumps the manifest version, builds and pushes the image under the version
//! tag and its floating tag, registers the pipeline on the platform, then
//! records the new version in the manifest. The manifest is only rewritten
//! once push and registration both succeeded.
//!
//! Syncing only replaces the default parameters of a registered pipeline;
//! no image is built.

use async_trait::async_trait;
use pxl_client::{PlatformClient, RegisterPipeline, SyncOutcome};
use pxl_core::domain::auth::AuthContext;
use pxl_core::domain::config::ParamValue;
use pxl_core::domain::manifest::{MANIFEST_FILE, ProjectManifest};
use pxl_core::domain::version::push_tags;
use std::collections::BTreeMap;
use tokio::process::Command;
use tracing::info;

use super::{
    CollaboratorError, CollaboratorResult, PublishOutcome, PublishRequest, Publisher, SyncRequest,
    load_manifest,
};
use crate::process::run_captured;
use crate::settings::ContainerEngine;

/// Publisher pushing to a container registry and the platform registry
pub struct RegistryPublisher {
    engine: ContainerEngine,
}

impl RegistryPublisher {
    pub fn new(engine: ContainerEngine) -> Self {
        Self { engine }
    }

    async fn run_engine(&self, args: &[&str], what: &str) -> CollaboratorResult {
        run_captured(Command::new(self.engine.binary()).args(args), what).await?;
        Ok(())
    }
}

fn platform_client(auth: &AuthContext) -> CollaboratorResult<PlatformClient> {
    PlatformClient::from_auth(auth).map_err(|e| CollaboratorError::new(e.to_string()))
}

fn json_defaults(defaults: &BTreeMap<String, ParamValue>) -> BTreeMap<String, serde_json::Value> {
    defaults
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect()
}

/// Registration payload for a manifest at a given version
fn registration_request(
    manifest: &ProjectManifest,
    req: &PublishRequest<'_>,
    version: &str,
) -> RegisterPipeline {
    RegisterPipeline {
        name: manifest.metadata.name.clone(),
        description: manifest.metadata.description.clone(),
        job_type: manifest.metadata.job_type.clone(),
        default_cpu: manifest.docker.cpu,
        default_gpu: manifest.docker.gpu,
        default_parameters: json_defaults(req.default_parameters),
        docker_image: manifest.docker.image_name.clone(),
        docker_tag: version.to_string(),
        docker_flags: manifest.docker.runtime_flags(),
    }
}

/// Manifest as it should be written after a successful deployment
fn released(mut manifest: ProjectManifest, version: &str) -> ProjectManifest {
    manifest.metadata.version = version.to_string();
    manifest.docker.image_tag = version.to_string();
    manifest
}

#[async_trait]
impl Publisher for RegistryPublisher {
    async fn build_push_register(
        &self,
        req: &PublishRequest<'_>,
    ) -> CollaboratorResult<PublishOutcome> {
        let manifest = load_manifest(req.workspace)?;

        let image = manifest.docker.image_name.clone();
        if image.is_empty() {
            return Err(CollaboratorError::new(format!(
                "no docker image_name set in {}",
                req.workspace.join(MANIFEST_FILE).display()
            )));
        }

        let version = req
            .bump
            .apply_str(&manifest.metadata.version)
            .map_err(|e| {
                CollaboratorError::new(format!(
                    "invalid version '{}' in manifest: {}",
                    manifest.metadata.version, e
                ))
            })?;
        let tags = push_tags(&version);
        let version = version.to_string();

        info!(
            "Publishing {} {} -> {} ({} bump)",
            req.project.display_name(),
            manifest.metadata.version,
            version,
            req.bump
        );

        let engine = self.engine.binary();
        let primary = format!("{}:{}", image, version);
        let workspace = req.workspace.to_string_lossy();

        self.run_engine(
            &["build", "-t", primary.as_str(), workspace.as_ref()],
            &format!("{} build", engine),
        )
        .await?;

        for tag in &tags {
            let reference = format!("{}:{}", image, tag);
            if reference != primary {
                self.run_engine(
                    &["tag", primary.as_str(), reference.as_str()],
                    &format!("{} tag", engine),
                )
                .await?;
            }
            self.run_engine(&["push", reference.as_str()], &format!("{} push", engine))
                .await?;
        }

        let registration = platform_client(req.auth)?
            .register_pipeline(&registration_request(&manifest, req, &version))
            .await
            .map_err(|e| CollaboratorError::new(format!("registration failed: {}", e)))?;

        let path = req.workspace.join(MANIFEST_FILE);
        let content = released(manifest, &version)
            .to_toml_string()
            .map_err(|e| CollaboratorError::new(format!("failed to render manifest: {}", e)))?;
        tokio::fs::write(&path, content).await.map_err(|e| {
            CollaboratorError::new(format!("failed to write {}: {}", path.display(), e))
        })?;

        Ok(PublishOutcome {
            version,
            tags,
            registration,
        })
    }

    async fn sync_parameters(&self, req: &SyncRequest<'_>) -> CollaboratorResult<SyncOutcome> {
        let manifest = load_manifest(req.workspace)?;
        let client = platform_client(req.auth)?;

        info!(
            "Syncing {} default parameter(s) of {}",
            req.default_parameters.len(),
            req.project.display_name()
        );
        client
            .sync_default_parameters(
                &manifest.metadata.name,
                &json_defaults(req.default_parameters),
            )
            .await
            .map_err(|e| CollaboratorError::new(format!("sync failed: {}", e)))
    }
}
