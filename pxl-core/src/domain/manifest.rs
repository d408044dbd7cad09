//! Project manifest (`config.toml`)

use serde::{Deserialize, Serialize};

use crate::domain::project::PipelineType;

/// Manifest file name inside a project workspace
pub const MANIFEST_FILE: &str = "config.toml";

/// Default parameter schema file name
pub const SCHEMA_FILE: &str = "parameters.toml";

/// Working run configuration file name
pub const RUN_CONFIG_FILE: &str = "run_config.toml";

/// Project manifest written by the scaffolder and updated on deploy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub metadata: ManifestMetadata,
    #[serde(default)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    pub docker: DockerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub pipeline_type: PipelineType,
    pub template: String,
    /// Published version, `MAJOR.MINOR.PATCH[-rcN]`
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Platform job type, e.g. `DATASET_VERSION_CREATION`
    #[serde(default)]
    pub job_type: String,
}

/// How the pipeline is executed; every key may be omitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSettings {
    #[serde(default = "default_pipeline_script")]
    pub pipeline_script: String,
    #[serde(default = "default_requirements_file")]
    pub requirements_file: String,
    #[serde(default = "default_parameters_file")]
    pub parameters_file: String,
}

fn default_pipeline_script() -> String {
    "pipeline.py".to_string()
}

fn default_requirements_file() -> String {
    "requirements.txt".to_string()
}

fn default_parameters_file() -> String {
    SCHEMA_FILE.to_string()
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            pipeline_script: default_pipeline_script(),
            requirements_file: default_requirements_file(),
            parameters_file: default_parameters_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerSettings {
    #[serde(default)]
    pub image_name: String,
    #[serde(default = "default_image_tag")]
    pub image_tag: String,
    #[serde(default = "default_cpu")]
    pub cpu: u32,
    #[serde(default)]
    pub gpu: u32,
}

fn default_image_tag() -> String {
    "latest".to_string()
}

fn default_cpu() -> u32 {
    4
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            image_name: String::new(),
            image_tag: default_image_tag(),
            cpu: default_cpu(),
            gpu: 0,
        }
    }
}

impl DockerSettings {
    /// Extra `docker run` flags implied by the resource allocation
    pub fn runtime_flags(&self) -> Vec<String> {
        if self.gpu > 0 {
            vec!["--gpus=all".to_string(), "--ipc=host".to_string()]
        } else {
            Vec::new()
        }
    }
}

impl ProjectManifest {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_defaults() {
        let manifest = ProjectManifest::from_toml_str(
            r#"
[metadata]
name = "simple"
type = "processing"
template = "simple"
version = "0.1.0"
"#,
        )
        .unwrap();

        assert_eq!(manifest.metadata.pipeline_type, PipelineType::Processing);
        assert_eq!(manifest.execution.pipeline_script, "pipeline.py");
        assert_eq!(manifest.execution.parameters_file, SCHEMA_FILE);
        assert!(manifest.docker.runtime_flags().is_empty());
    }

    #[test]
    fn test_partial_tables_keep_defaults() {
        let manifest = ProjectManifest::from_toml_str(
            r#"
[metadata]
name = "cleaner"
type = "processing"
template = "simple"
version = "0.3.0"

[execution]
parameters_file = "params/schema.toml"

[docker]
image_name = "acme/cleaner"
gpu = 1
"#,
        )
        .unwrap();

        assert_eq!(manifest.execution.parameters_file, "params/schema.toml");
        assert_eq!(manifest.execution.pipeline_script, "pipeline.py");
        assert_eq!(manifest.execution.requirements_file, "requirements.txt");
        assert_eq!(manifest.docker.image_tag, "latest");
        assert_eq!(manifest.docker.cpu, 4);
        assert_eq!(manifest.docker.gpu, 1);
    }

    #[test]
    fn test_gpu_flags() {
        let docker = DockerSettings {
            gpu: 1,
            ..Default::default()
        };
        assert_eq!(docker.runtime_flags(), vec!["--gpus=all", "--ipc=host"]);
    }
}
