//! Parameter schema and run configuration types
//!
//! A project declares its parameters in a schema (`parameters.toml`). A run
//! configuration (`run_config.toml`) is resolved against that schema into a
//! `RunConfiguration` where every declared parameter carries a typed value.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::PipelineError;

/// Declared type of a pipeline parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Bool,
    Int,
    Float,
    String,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Bool => "bool",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::String => "string",
        }
    }

    /// Converts a raw TOML value to this type
    ///
    /// Strings are parsed for numeric and boolean types, integers widen to
    /// floats, and any scalar renders as a string. Arrays, tables and
    /// datetimes never convert.
    pub fn coerce(&self, raw: &toml::Value) -> Option<ParamValue> {
        use toml::Value;

        match (self, raw) {
            (ParamType::Bool, Value::Boolean(b)) => Some(ParamValue::Bool(*b)),
            (ParamType::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(ParamValue::Bool(true)),
                "false" | "no" | "0" => Some(ParamValue::Bool(false)),
                _ => None,
            },
            (ParamType::Int, Value::Integer(i)) => Some(ParamValue::Int(*i)),
            (ParamType::Int, Value::String(s)) => s.trim().parse().ok().map(ParamValue::Int),
            (ParamType::Float, Value::Float(f)) => Some(ParamValue::Float(*f)),
            (ParamType::Float, Value::Integer(i)) => Some(ParamValue::Float(*i as f64)),
            (ParamType::Float, Value::String(s)) => s.trim().parse().ok().map(ParamValue::Float),
            (ParamType::String, Value::String(s)) => Some(ParamValue::String(s.clone())),
            (ParamType::String, Value::Integer(i)) => Some(ParamValue::String(i.to_string())),
            (ParamType::String, Value::Float(f)) => Some(ParamValue::String(f.to_string())),
            (ParamType::String, Value::Boolean(b)) => Some(ParamValue::String(b.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Bool(_) => ParamType::Bool,
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::String(_) => ParamType::String,
        }
    }

    pub fn to_toml(&self) -> toml::Value {
        match self {
            ParamValue::Bool(b) => toml::Value::Boolean(*b),
            ParamValue::Int(i) => toml::Value::Integer(*i),
            ParamValue::Float(f) => toml::Value::Float(*f),
            ParamValue::String(s) => toml::Value::String(s.clone()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParamValue::Bool(b) => serde_json::Value::Bool(*b),
            ParamValue::Int(i) => serde_json::Value::from(*i),
            ParamValue::Float(f) => serde_json::Value::from(*f),
            ParamValue::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(x) => write!(f, "{}", x),
            ParamValue::String(s) => write!(f, "{}", s),
        }
    }
}

/// Declaration of one pipeline parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Mandatory, so the value can be registered on the platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<toml::Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, param_type: ParamType, default: ParamValue) -> Self {
        Self {
            name: name.into(),
            param_type,
            default: Some(default.to_toml()),
            required: false,
            description: None,
        }
    }
}

/// Parameter schema of a project (`parameters.toml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(default, rename = "parameter")]
    pub parameters: Vec<ParameterSpec>,
}

impl ParameterSchema {
    pub fn new(parameters: Vec<ParameterSpec>) -> Self {
        Self { parameters }
    }

    /// Parses a schema document
    pub fn from_toml_str(content: &str) -> Result<Self, PipelineError> {
        toml::from_str(content).map_err(|e| PipelineError::Schema(e.message().to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Validates the schema and returns its typed defaults
    ///
    /// Fails when a parameter has no default, a default of the wrong type,
    /// an empty name, or a name declared twice. This does not depend on any
    /// run configuration.
    pub fn defaults(&self) -> Result<BTreeMap<String, ParamValue>, PipelineError> {
        let mut seen = HashSet::new();
        let mut defaults = BTreeMap::new();

        for spec in &self.parameters {
            if spec.name.trim().is_empty() {
                return Err(PipelineError::Schema(
                    "parameter with an empty name".to_string(),
                ));
            }

            if !seen.insert(spec.name.as_str()) {
                return Err(PipelineError::Schema(format!(
                    "parameter '{}' is declared more than once",
                    spec.name
                )));
            }

            let raw = spec.default.as_ref().ok_or_else(|| {
                PipelineError::Schema(format!("parameter '{}' has no default value", spec.name))
            })?;

            let value = spec.param_type.coerce(raw).ok_or_else(|| {
                PipelineError::Schema(format!(
                    "default {} of parameter '{}' is not a valid {}",
                    raw, spec.name, spec.param_type
                ))
            })?;

            defaults.insert(spec.name.clone(), value);
        }

        Ok(defaults)
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Naming policy for produced artifacts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Output slot -> artifact name (e.g. `dataset_version` -> `processed_v1`)
    pub names: BTreeMap<String, String>,
}

/// A validated, typed run configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunConfiguration {
    pub job_type: String,
    /// Named external object identifiers; may be empty pending user fill-in
    pub input_refs: BTreeMap<String, String>,
    pub output_spec: OutputSpec,
    /// Every declared parameter, typed
    pub parameters: BTreeMap<String, ParamValue>,
    pub override_outputs: bool,
    /// Parameters present in the file but absent from the schema
    pub extra_parameters: BTreeMap<String, toml::Value>,
    /// Remaining keys of the `[run]` section
    pub run_options: toml::Table,
    /// Top-level sections the resolver does not know about
    pub extra_sections: BTreeMap<String, toml::Value>,
}

impl RunConfiguration {
    /// Input references that still have no value
    pub fn missing_inputs(&self) -> Vec<&str> {
        self.input_refs
            .iter()
            .filter(|(_, id)| id.trim().is_empty())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Renders the configuration back to a run configuration document
    ///
    /// Unknown parameters and sections are written back unchanged.
    pub fn to_toml_table(&self) -> toml::Table {
        use toml::Value;

        let mut table = toml::Table::new();
        for (key, value) in &self.extra_sections {
            table.insert(key.clone(), value.clone());
        }

        let mut run = self.run_options.clone();
        run.insert(
            "override_outputs".to_string(),
            Value::Boolean(self.override_outputs),
        );
        table.insert("run".to_string(), Value::Table(run));

        let mut job = toml::Table::new();
        job.insert("type".to_string(), Value::String(self.job_type.clone()));
        table.insert("job".to_string(), Value::Table(job));

        let input: toml::Table = self
            .input_refs
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        table.insert("input".to_string(), Value::Table(input));

        let output: toml::Table = self
            .output_spec
            .names
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        table.insert("output".to_string(), Value::Table(output));

        let mut parameters: toml::Table = self
            .extra_parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (name, value) in &self.parameters {
            parameters.insert(name.clone(), value.to_toml());
        }
        table.insert("parameters".to_string(), Value::Table(parameters));

        table
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&self.to_toml_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_conversions() {
        use toml::Value;

        assert_eq!(
            ParamType::Int.coerce(&Value::String(" 42 ".into())),
            Some(ParamValue::Int(42))
        );
        assert_eq!(
            ParamType::Float.coerce(&Value::Integer(3)),
            Some(ParamValue::Float(3.0))
        );
        assert_eq!(
            ParamType::Bool.coerce(&Value::String("Yes".into())),
            Some(ParamValue::Bool(true))
        );
        assert_eq!(
            ParamType::String.coerce(&Value::Integer(7)),
            Some(ParamValue::String("7".into()))
        );
        assert_eq!(ParamType::Int.coerce(&Value::Float(1.5)), None);
        assert_eq!(ParamType::Int.coerce(&Value::String("ten".into())), None);
        assert_eq!(ParamType::String.coerce(&Value::Array(vec![])), None);
    }

    #[test]
    fn test_schema_from_toml() {
        let schema = ParameterSchema::from_toml_str(
            r#"
[[parameter]]
name = "batch_size"
type = "int"
default = 8

[[parameter]]
name = "tags_list"
type = "string"
default = ""
required = true
"#,
        )
        .unwrap();

        assert_eq!(schema.parameters.len(), 2);
        assert!(schema.get("tags_list").unwrap().required);

        let defaults = schema.defaults().unwrap();
        assert_eq!(defaults["batch_size"], ParamValue::Int(8));
    }

    #[test]
    fn test_schema_missing_default() {
        let schema = ParameterSchema::from_toml_str(
            r#"
[[parameter]]
name = "epochs"
type = "int"
"#,
        )
        .unwrap();

        let err = schema.defaults().unwrap_err();
        assert!(matches!(err, PipelineError::Schema(ref msg) if msg.contains("epochs")));
    }

    #[test]
    fn test_schema_rejects_mistyped_default_and_duplicates() {
        let mistyped = ParameterSchema::new(vec![ParameterSpec {
            name: "lr".into(),
            param_type: ParamType::Float,
            default: Some(toml::Value::String("fast".into())),
            required: false,
            description: None,
        }]);
        assert!(matches!(mistyped.defaults(), Err(PipelineError::Schema(_))));

        let duplicated = ParameterSchema::new(vec![
            ParameterSpec::new("lr", ParamType::Float, ParamValue::Float(0.1)),
            ParameterSpec::new("lr", ParamType::Float, ParamValue::Float(0.2)),
        ]);
        assert!(matches!(duplicated.defaults(), Err(PipelineError::Schema(_))));
    }

    #[test]
    fn test_run_configuration_renders_extras() {
        let mut config = RunConfiguration {
            job_type: "DATASET_VERSION_CREATION".into(),
            ..Default::default()
        };
        config
            .input_refs
            .insert("dataset_version".into(), String::new());
        config
            .parameters
            .insert("batch_size".into(), ParamValue::Int(4));
        config
            .extra_parameters
            .insert("future_flag".into(), toml::Value::Boolean(true));

        assert_eq!(config.missing_inputs(), vec!["dataset_version"]);

        let table = config.to_toml_table();
        let params = table["parameters"].as_table().unwrap();
        assert_eq!(params["batch_size"].as_integer(), Some(4));
        assert_eq!(params["future_flag"].as_bool(), Some(true));
        assert_eq!(table["job"]["type"].as_str(), Some("DATASET_VERSION_CREATION"));
        assert_eq!(table["run"]["override_outputs"].as_bool(), Some(false));

        assert!(config.to_toml_string().is_ok());
    }
}
