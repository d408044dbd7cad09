//! Template scaffolding
//!
//! Built-in catalogue of project templates. Generating a template writes the
//! manifest, parameter schema, default run configuration, the Python
//! entrypoint and steps, and the container build files.

use async_trait::async_trait;
use pxl_core::domain::config::{
    OutputSpec, ParamType, ParamValue, ParameterSchema, ParameterSpec, RunConfiguration,
};
use pxl_core::domain::manifest::{
    DockerSettings, ExecutionSettings, MANIFEST_FILE, ManifestMetadata, ProjectManifest,
    RUN_CONFIG_FILE, SCHEMA_FILE,
};
use pxl_core::domain::project::{PipelineProject, PipelineType};
use std::path::Path;
use tracing::{debug, info};

use super::{CollaboratorError, CollaboratorResult, Scaffolder};

/// Version a freshly scaffolded project starts at
const INITIAL_VERSION: &str = "0.1.0";

/// One entry of the template catalogue
#[derive(Debug, Clone)]
pub struct Template {
    pub name: &'static str,
    pub pipeline_type: PipelineType,
    pub description: &'static str,
    pub job_type: &'static str,
    pub inputs: Vec<&'static str>,
    pub outputs: Vec<(&'static str, &'static str)>,
    pub parameters: Vec<ParameterSpec>,
    pub requirements: Vec<&'static str>,
    /// Body of the `process` step
    pub step_body: &'static str,
    pub gpu: u32,
}

impl Template {
    fn manifest(&self, project: &PipelineProject) -> ProjectManifest {
        ProjectManifest {
            metadata: ManifestMetadata {
                name: project.name.clone(),
                pipeline_type: self.pipeline_type,
                template: self.name.to_string(),
                version: INITIAL_VERSION.to_string(),
                description: self.description.to_string(),
                job_type: self.job_type.to_string(),
            },
            execution: ExecutionSettings::default(),
            docker: DockerSettings {
                image_name: project.name.replace('_', "-"),
                gpu: self.gpu,
                ..Default::default()
            },
        }
    }

    fn run_configuration(&self) -> RunConfiguration {
        RunConfiguration {
            job_type: self.job_type.to_string(),
            input_refs: self
                .inputs
                .iter()
                .map(|name| (name.to_string(), String::new()))
                .collect(),
            output_spec: OutputSpec {
                names: self
                    .outputs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
            parameters: self
                .parameters
                .iter()
                .filter_map(|p| {
                    let value = p.param_type.coerce(p.default.as_ref()?)?;
                    Some((p.name.clone(), value))
                })
                .collect(),
            ..Default::default()
        }
    }

    fn pipeline_py(&self, project: &PipelineProject) -> String {
        format!(
            r#"import argparse
import os
import tomllib

from steps import process


def load_config(path):
    with open(path, "rb") as f:
        return tomllib.load(f)


def main():
    parser = argparse.ArgumentParser(description="{description}")
    parser.add_argument("--config-file", required=True)
    args = parser.parse_args()

    config = load_config(args.config_file)
    context = {{
        "api_token": os.environ["API_TOKEN"],
        "organization_name": os.environ["ORGANIZATION_NAME"],
        "host": os.environ.get("HOST"),
        "job_type": config.get("job", {{}}).get("type"),
        "inputs": config.get("input", {{}}),
        "outputs": config.get("output", {{}}),
        "override_outputs": config.get("run", {{}}).get("override_outputs", False),
    }}
    process(context, config.get("parameters", {{}}))


if __name__ == "__main__":
    main()
"#,
            description = format!("{} ({})", project.name, self.description),
        )
    }

    fn steps_py(&self) -> String {
        format!(
            r#"def process(context, parameters):
    """{description}"""
{body}
"#,
            description = self.description,
            body = self.step_body,
        )
    }

    fn requirements_txt(&self) -> String {
        let mut content = self.requirements.join("\n");
        content.push('\n');
        content
    }

    fn dockerfile(&self, manifest: &ProjectManifest) -> String {
        let base = if self.gpu > 0 {
            "nvidia/cuda:12.2.0-runtime-ubuntu22.04"
        } else {
            "python:3.11-slim"
        };

        format!(
            r#"FROM {base}

RUN pip install --no-cache-dir uv

WORKDIR /experiment

COPY {requirements} ./
RUN uv pip install --system --no-cache -r {requirements}

COPY . .

ENV PYTHONPATH=/experiment

ENTRYPOINT ["python3", "{script}"]
"#,
            base = base,
            requirements = manifest.execution.requirements_file,
            script = manifest.execution.pipeline_script,
        )
    }
}

const DOCKERIGNORE: &str = ".venv/\nruns/\n__pycache__/\n*.pyc\n";

/// Scaffolder backed by the built-in template catalogue
pub struct TemplateScaffolder {
    templates: Vec<Template>,
}

impl TemplateScaffolder {
    pub fn new() -> Self {
        Self {
            templates: builtin_templates(),
        }
    }

    pub fn find(&self, pipeline_type: PipelineType, name: &str) -> Option<&Template> {
        self.templates
            .iter()
            .find(|t| t.pipeline_type == pipeline_type && t.name == name)
    }

    /// Template names available for a type
    pub fn names(&self, pipeline_type: PipelineType) -> Vec<&'static str> {
        self.templates
            .iter()
            .filter(|t| t.pipeline_type == pipeline_type)
            .map(|t| t.name)
            .collect()
    }
}

impl Default for TemplateScaffolder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scaffolder for TemplateScaffolder {
    fn has_template(&self, pipeline_type: PipelineType, template: &str) -> bool {
        self.find(pipeline_type, template).is_some()
    }

    async fn generate(&self, project: &PipelineProject, workspace: &Path) -> CollaboratorResult {
        let template = self
            .find(project.pipeline_type, &project.template_name)
            .ok_or_else(|| {
                CollaboratorError::new(format!(
                    "unknown {} template '{}'",
                    project.pipeline_type, project.template_name
                ))
            })?;

        info!(
            "Scaffolding {} from template '{}'",
            project.display_name(),
            template.name
        );

        let manifest = template.manifest(project);
        let schema = ParameterSchema::new(template.parameters.clone());

        let files = [
            (MANIFEST_FILE, serialize(manifest.to_toml_string())?),
            (SCHEMA_FILE, serialize(schema.to_toml_string())?),
            (
                RUN_CONFIG_FILE,
                serialize(template.run_configuration().to_toml_string())?,
            ),
            ("pipeline.py", template.pipeline_py(project)),
            ("steps.py", template.steps_py()),
            ("requirements.txt", template.requirements_txt()),
            ("Dockerfile", template.dockerfile(&manifest)),
            (".dockerignore", DOCKERIGNORE.to_string()),
        ];

        for (name, content) in files {
            let path = workspace.join(name);
            tokio::fs::write(&path, content).await.map_err(|e| {
                CollaboratorError::new(format!("failed to write {}: {}", path.display(), e))
            })?;
            debug!("Wrote {}", path.display());
        }

        Ok(())
    }
}

fn serialize(result: Result<String, toml::ser::Error>) -> CollaboratorResult<String> {
    result.map_err(|e| CollaboratorError::new(format!("failed to render TOML: {}", e)))
}

fn param(
    name: &str,
    param_type: ParamType,
    default: ParamValue,
    description: &str,
) -> ParameterSpec {
    ParameterSpec {
        description: Some(description.to_string()),
        ..ParameterSpec::new(name, param_type, default)
    }
}

fn builtin_templates() -> Vec<Template> {
    vec![
        Template {
            name: "simple",
            pipeline_type: PipelineType::Processing,
            description: "Copies a dataset version, image by image",
            job_type: "DATASET_VERSION_CREATION",
            inputs: vec!["dataset_version"],
            outputs: vec![("dataset_version_name", "processed")],
            parameters: vec![param(
                "datalake",
                ParamType::String,
                ParamValue::String("default".into()),
                "Datalake receiving the output images",
            )],
            requirements: vec!["picsellia>=6.10", "pillow>=10.0"],
            step_body: "    for name, ref in context[\"inputs\"].items():\n        print(f\"processing {name}={ref} with {parameters}\")",
            gpu: 0,
        },
        Template {
            name: "dataset_version_creation",
            pipeline_type: PipelineType::Processing,
            description: "Creates a new dataset version from an existing one",
            job_type: "DATASET_VERSION_CREATION",
            inputs: vec!["dataset_version"],
            outputs: vec![("dataset_version_name", "processed")],
            parameters: vec![
                param(
                    "datalake",
                    ParamType::String,
                    ParamValue::String("default".into()),
                    "Datalake receiving the output images",
                ),
                param(
                    "data_tag",
                    ParamType::String,
                    ParamValue::String("processed".into()),
                    "Tag added to uploaded data",
                ),
            ],
            requirements: vec!["picsellia>=6.10", "pillow>=10.0"],
            step_body: "    print(f\"creating {context['outputs']} from {context['inputs']}\")",
            gpu: 0,
        },
        Template {
            name: "pre_annotation",
            pipeline_type: PipelineType::Processing,
            description: "Pre-annotates a dataset version with a model version",
            job_type: "PRE_ANNOTATION",
            inputs: vec!["dataset_version", "model_version"],
            outputs: vec![],
            parameters: vec![
                param(
                    "batch_size",
                    ParamType::Int,
                    ParamValue::Int(8),
                    "Images per inference batch",
                ),
                param(
                    "confidence_threshold",
                    ParamType::Float,
                    ParamValue::Float(0.5),
                    "Minimum score of a kept prediction",
                ),
            ],
            requirements: vec!["picsellia>=6.10", "ultralytics>=8.0"],
            step_body: "    print(f\"annotating with threshold {parameters['confidence_threshold']}\")",
            gpu: 1,
        },
        Template {
            name: "data_auto_tagging",
            pipeline_type: PipelineType::Processing,
            description: "Tags datalake data with a model version",
            job_type: "DATA_AUTO_TAGGING",
            inputs: vec!["datalake", "model_version"],
            outputs: vec![("datalake", "default")],
            parameters: vec![
                param(
                    "tags_list",
                    ParamType::String,
                    ParamValue::String(String::new()),
                    "Comma-separated candidate tags",
                ),
                param(
                    "batch_size",
                    ParamType::Int,
                    ParamValue::Int(8),
                    "Images per inference batch",
                ),
                param(
                    "limit",
                    ParamType::Int,
                    ParamValue::Int(100),
                    "Maximum number of data to tag",
                ),
            ],
            requirements: vec!["picsellia>=6.10", "transformers>=4.40", "torch>=2.2"],
            step_body: "    print(f\"tagging with {parameters['tags_list']!r}\")",
            gpu: 1,
        },
        Template {
            name: "simple",
            pipeline_type: PipelineType::Training,
            description: "Trains a model on a dataset version",
            job_type: "TRAINING",
            inputs: vec!["experiment"],
            outputs: vec![],
            parameters: vec![
                param("epochs", ParamType::Int, ParamValue::Int(3), "Training epochs"),
                param(
                    "batch_size",
                    ParamType::Int,
                    ParamValue::Int(8),
                    "Images per training batch",
                ),
                param(
                    "learning_rate",
                    ParamType::Float,
                    ParamValue::Float(0.001),
                    "Optimizer learning rate",
                ),
                param(
                    "augment",
                    ParamType::Bool,
                    ParamValue::Bool(true),
                    "Enable data augmentation",
                ),
            ],
            requirements: vec!["picsellia>=6.10", "ultralytics>=8.0"],
            step_body: "    print(f\"training for {parameters['epochs']} epoch(s)\")",
            gpu: 1,
        },
    ]
}
