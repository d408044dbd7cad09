//! Pipeline project domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// Kind of pipeline a project implements
///
/// Project names are unique within one type namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineType {
    Processing,
    Training,
}

impl PipelineType {
    pub const ALL: [PipelineType; 2] = [PipelineType::Processing, PipelineType::Training];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineType::Processing => "processing",
            PipelineType::Training => "training",
        }
    }
}

impl fmt::Display for PipelineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processing" => Ok(PipelineType::Processing),
            "training" => Ok(PipelineType::Training),
            other => Err(PipelineError::Argument(format!(
                "unknown pipeline type '{}' (expected processing or training)",
                other
            ))),
        }
    }
}

/// A pipeline project
///
/// Owns exactly one workspace directory. Created by `init`, never implicitly
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineProject {
    pub name: String,
    pub pipeline_type: PipelineType,
    /// Template the project was scaffolded from
    pub template_name: String,
}

impl PipelineProject {
    pub fn new(
        name: impl Into<String>,
        pipeline_type: PipelineType,
        template_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pipeline_type,
            template_name: template_name.into(),
        }
    }

    /// Project named after the template it starts from (batch runs)
    pub fn from_template(pipeline_type: PipelineType, template_name: impl Into<String>) -> Self {
        let template_name = template_name.into();
        Self::new(template_name.clone(), pipeline_type, template_name)
    }

    /// `type/name`, as shown in reports
    pub fn display_name(&self) -> String {
        format!("{}/{}", self.pipeline_type, self.name)
    }
}

/// Validates a project or template name
///
/// Names become directory names, so path separators and dot-only names are
/// rejected. `all` is reserved for the batch selector.
pub fn validate_project_name(name: &str) -> Result<(), PipelineError> {
    if name.is_empty() {
        return Err(PipelineError::Argument(
            "project name cannot be empty".to_string(),
        ));
    }

    if name == "all" {
        return Err(PipelineError::Argument(
            "'all' is reserved and cannot be used as a project name".to_string(),
        ));
    }

    if name.chars().all(|c| c == '.') {
        return Err(PipelineError::Argument(format!(
            "invalid project name '{}'",
            name
        )));
    }

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(PipelineError::Argument(format!(
            "invalid character '{}' in project name '{}'",
            c, name
        )));
    }

    Ok(())
}
