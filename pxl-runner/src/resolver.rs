//! Configuration resolver
//!
//! Resolves a raw run configuration document against a project's parameter
//! schema. Resolution is pure: nothing here writes to disk.

use pxl_core::domain::config::{OutputSpec, ParameterSchema, RunConfiguration};
use pxl_core::domain::manifest::{MANIFEST_FILE, ProjectManifest, SCHEMA_FILE};
use pxl_core::{PipelineError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use toml::{Table, Value};
use tracing::debug;

/// Sections the resolver interprets; anything else is preserved and flagged
const KNOWN_SECTIONS: [&str; 5] = ["job", "input", "output", "parameters", "run"];

/// A resolved configuration plus the warnings raised while resolving it
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub config: RunConfiguration,
    pub warnings: Vec<String>,
}

/// Resolves `raw` against `schema`
///
/// Every declared parameter ends up typed: a present value is converted to
/// the declared type, an absent one takes the declared default. A schema
/// without a default on any parameter fails with `Schema` before the run
/// configuration is looked at.
///
/// # Arguments
/// * `schema` - The project's parameter schema
/// * `raw` - The parsed run configuration document
/// * `path` - Where `raw` was read from, for error messages
pub fn resolve(schema: &ParameterSchema, raw: &Table, path: &Path) -> Result<Resolved> {
    let defaults = schema.defaults()?;
    let mut warnings = Vec::new();
    let mut config = RunConfiguration::default();

    if let Some(job) = section(raw, "job", path)? {
        config.job_type = match job.get("type") {
            None => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(malformed(
                    path,
                    format!("job type must be a string, got {}", other),
                ));
            }
        };
    }

    if let Some(input) = section(raw, "input", path)? {
        for (name, value) in input {
            config
                .input_refs
                .insert(name.clone(), input_ref(name, value, path)?);
        }
    }

    if let Some(output) = section(raw, "output", path)? {
        config.output_spec = OutputSpec {
            names: scalar_strings(output, "output", path)?,
        };
    }

    let provided = section(raw, "parameters", path)?.cloned().unwrap_or_default();

    for spec in &schema.parameters {
        let value = match provided.get(&spec.name) {
            Some(raw_value) => {
                spec.param_type
                    .coerce(raw_value)
                    .ok_or_else(|| PipelineError::TypeMismatch {
                        name: spec.name.clone(),
                        expected: spec.param_type,
                        value: raw_value.to_string(),
                    })?
            }
            None => match defaults.get(&spec.name) {
                Some(default) => default.clone(),
                None => {
                    return Err(PipelineError::Schema(format!(
                        "parameter '{}' has no default value",
                        spec.name
                    )));
                }
            },
        };

        if spec.required && value.to_string().trim().is_empty() {
            warnings.push(format!("required parameter '{}' has no value", spec.name));
        }

        config.parameters.insert(spec.name.clone(), value);
    }

    for (name, value) in provided {
        if schema.get(&name).is_none() {
            warnings.push(format!("parameter '{}' is not declared in the schema", name));
            config.extra_parameters.insert(name, value);
        }
    }

    let mut run_options = section(raw, "run", path)?.cloned().unwrap_or_default();
    let override_value = run_options
        .remove("override_outputs")
        .or_else(|| raw.get("override_outputs").cloned());
    config.override_outputs = match override_value {
        None => false,
        Some(Value::Boolean(b)) => b,
        Some(other) => {
            return Err(malformed(
                path,
                format!("override_outputs must be a boolean, got {}", other),
            ));
        }
    };
    config.run_options = run_options;

    for (key, value) in raw {
        if KNOWN_SECTIONS.contains(&key.as_str()) || key == "override_outputs" {
            continue;
        }
        warnings.push(format!("unknown section '{}' kept as is", key));
        config.extra_sections.insert(key.clone(), value.clone());
    }

    for name in config.missing_inputs() {
        warnings.push(format!("input '{}' has no value yet", name));
    }

    debug!(
        "Resolved {} parameter(s) from {} with {} warning(s)",
        config.parameters.len(),
        path.display(),
        warnings.len()
    );

    Ok(Resolved { config, warnings })
}

/// Loads a parameter schema
///
/// A project without a schema file declares no parameters.
pub fn load_schema(path: &Path) -> Result<ParameterSchema> {
    if !path.exists() {
        return Ok(ParameterSchema::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::Schema(format!("cannot read {}: {}", path.display(), e)))?;

    ParameterSchema::from_toml_str(&content)
        .map_err(|e| PipelineError::Schema(format!("{}: {}", path.display(), e)))
}

/// Loads a raw run configuration document
pub fn load_run_config(path: &Path) -> Result<Table> {
    if !path.is_file() {
        return Err(PipelineError::MissingRunConfig {
            path: path.to_path_buf(),
        });
    }

    let content =
        std::fs::read_to_string(path).map_err(|e| malformed(path, e.to_string()))?;

    content
        .parse::<Table>()
        .map_err(|e| malformed(path, e.message().to_string()))
}

/// Schema file of a project workspace
///
/// Taken from the manifest when there is one.
pub fn schema_path(workspace: &Path) -> Result<PathBuf> {
    let manifest_path = workspace.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Ok(workspace.join(SCHEMA_FILE));
    }

    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| PipelineError::workspace_access(&manifest_path, e))?;
    let manifest = ProjectManifest::from_toml_str(&content).map_err(|e| {
        let message = format!("invalid manifest: {}", e.message());
        PipelineError::workspace_access(&manifest_path, message)
    })?;

    Ok(workspace.join(manifest.execution.parameters_file))
}

/// Resolves a run configuration file against a workspace's schema
///
/// The file is usually the workspace's own `run_config.toml`, or the copy
/// kept in a previous run directory.
pub fn resolve_file(workspace: &Path, run_config_path: &Path) -> Result<Resolved> {
    let schema = load_schema(&schema_path(workspace)?)?;
    let raw = load_run_config(run_config_path)?;
    resolve(&schema, &raw, run_config_path)
}

fn section<'a>(raw: &'a Table, name: &str, path: &Path) -> Result<Option<&'a Table>> {
    match raw.get(name) {
        None => Ok(None),
        Some(Value::Table(table)) => Ok(Some(table)),
        Some(_) => Err(malformed(path, format!("[{}] must be a table", name))),
    }
}

/// An input reference is either `name = "id"` or `[input.name] id = "..."`
fn input_ref(name: &str, value: &Value, path: &Path) -> Result<String> {
    match value {
        Value::String(id) => Ok(id.clone()),
        Value::Integer(id) => Ok(id.to_string()),
        Value::Table(table) => match table.get("id") {
            None => Ok(String::new()),
            Some(Value::String(id)) => Ok(id.clone()),
            Some(Value::Integer(id)) => Ok(id.to_string()),
            Some(other) => Err(malformed(
                path,
                format!("input '{}' has a non-string id {}", name, other),
            )),
        },
        other => Err(malformed(
            path,
            format!("input '{}' must be an id or a table, got {}", name, other),
        )),
    }
}

fn scalar_strings(table: &Table, section: &str, path: &Path) -> Result<BTreeMap<String, String>> {
    table
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key.clone(), s.clone())),
            Value::Integer(_) | Value::Float(_) | Value::Boolean(_) => {
                Ok((key.clone(), value.to_string()))
            }
            other => Err(malformed(
                path,
                format!("{}.{} must be a scalar, got {}", section, key, other),
            )),
        })
        .collect()
}

fn malformed(path: &Path, message: impl Into<String>) -> PipelineError {
    PipelineError::MalformedRunConfig {
        path: path.to_path_buf(),
        message: message.into(),
    }
}
