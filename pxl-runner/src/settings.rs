//! Runner settings
//!
//! Where workspaces and template fixtures live, which container engine to
//! drive, and whether the report is persisted.

use pxl_core::domain::manifest::RUN_CONFIG_FILE;
use pxl_core::{PipelineError, Result};
use pxl_core::domain::project::PipelineType;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Container engine used for smoke tests and publishing
///
/// Both engines accept the same argument shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerEngine {
    #[default]
    Docker,
    Podman,
}

impl ContainerEngine {
    /// Executable name
    pub fn binary(&self) -> &'static str {
        match self {
            ContainerEngine::Docker => "docker",
            ContainerEngine::Podman => "podman",
        }
    }
}

impl fmt::Display for ContainerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

impl FromStr for ContainerEngine {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(ContainerEngine::Docker),
            "podman" => Ok(ContainerEngine::Podman),
            other => Err(PipelineError::Argument(format!(
                "unsupported container engine '{}' (expected docker or podman)",
                other
            ))),
        }
    }
}

/// Runner settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Shared root holding one directory per project (`<root>/<type>/<name>`)
    pub workspace_root: PathBuf,

    /// Root of per-template fixtures (`<root>/<type>/<template>/`)
    pub templates_root: PathBuf,

    pub container_engine: ContainerEngine,

    /// Override file looked up in a template's `fixtures/` directory
    pub override_file_name: String,

    /// Append-only report file mirroring the console
    pub report_path: Option<PathBuf>,
}

impl Settings {
    /// Creates settings with defaults for everything but the two roots
    pub fn new(workspace_root: impl Into<PathBuf>, templates_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            templates_root: templates_root.into(),
            container_engine: ContainerEngine::default(),
            override_file_name: RUN_CONFIG_FILE.to_string(),
            report_path: None,
        }
    }

    /// Creates settings from environment variables, read through `lookup`
    ///
    /// Recognised variables:
    /// - PXL_WORKSPACE_ROOT (optional, default: current directory)
    /// - PXL_TEMPLATES_ROOT (optional, default: `templates`)
    /// - PXL_CONTAINER_ENGINE (optional, docker or podman, default: docker)
    /// - PXL_OVERRIDE_FILE (optional, default: run_config.toml)
    /// - PXL_REPORT_PATH (optional)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let workspace_root = get("PXL_WORKSPACE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let templates_root = get("PXL_TEMPLATES_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("templates"));

        let mut settings = Self::new(workspace_root, templates_root);

        if let Some(engine) = get("PXL_CONTAINER_ENGINE") {
            settings.container_engine = engine.parse()?;
        }

        if let Some(name) = get("PXL_OVERRIDE_FILE") {
            settings.override_file_name = name;
        }

        settings.report_path = get("PXL_REPORT_PATH").map(PathBuf::from);

        Ok(settings)
    }

    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    /// Validates the settings
    ///
    /// Every problem is an `Argument` error: settings come from flags and
    /// variables of the invocation.
    pub fn validate(&self) -> Result<()> {
        if self.workspace_root.as_os_str().is_empty() {
            return Err(invalid("workspace_root cannot be empty"));
        }

        if self.templates_root.as_os_str().is_empty() {
            return Err(invalid("templates_root cannot be empty"));
        }

        if self.override_file_name.is_empty()
            || self.override_file_name.contains(['/', '\\'])
        {
            return Err(invalid("override_file_name must be a plain file name"));
        }

        if let Some(report) = self.report_path.as_deref().filter(|p| p.is_dir()) {
            return Err(invalid(format!(
                "report_path {} is a directory",
                report.display()
            )));
        }

        Ok(())
    }

    /// Directory holding the fixtures of every template of a type
    pub fn templates_dir(&self, pipeline_type: PipelineType) -> PathBuf {
        self.templates_root.join(pipeline_type.as_str())
    }

    /// Fixture directory of one template
    pub fn template_dir(&self, pipeline_type: PipelineType, template: &str) -> PathBuf {
        self.templates_dir(pipeline_type).join(template)
    }

    /// Override configuration candidate for a template
    ///
    /// The file may not exist; absence is not an error.
    pub fn override_file(&self, pipeline_type: PipelineType, template: &str) -> PathBuf {
        self.template_dir(pipeline_type, template)
            .join("fixtures")
            .join(&self.override_file_name)
    }

    pub fn report_path(&self) -> Option<&Path> {
        self.report_path.as_deref()
    }
}

fn invalid(message: impl Into<String>) -> PipelineError {
    PipelineError::Argument(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.workspace_root, PathBuf::from("."));
        assert_eq!(settings.templates_root, PathBuf::from("templates"));
        assert_eq!(settings.container_engine, ContainerEngine::Docker);
        assert_eq!(settings.override_file_name, "run_config.toml");
        assert!(settings.report_path().is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_from_variables() {
        let settings = Settings::from_lookup(lookup(&[
            ("PXL_WORKSPACE_ROOT", "/tmp/ws"),
            ("PXL_CONTAINER_ENGINE", "Podman"),
            ("PXL_REPORT_PATH", "/tmp/report.txt"),
        ]))
        .unwrap();

        assert_eq!(settings.workspace_root, PathBuf::from("/tmp/ws"));
        assert_eq!(settings.container_engine, ContainerEngine::Podman);
        assert_eq!(settings.report_path(), Some(Path::new("/tmp/report.txt")));
    }

    #[test]
    fn test_invalid_engine_is_rejected() {
        let result = Settings::from_lookup(lookup(&[("PXL_CONTAINER_ENGINE", "lxc")]));
        assert!(matches!(result, Err(PipelineError::Argument(_))));
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = Settings::new("/tmp/ws", "templates");
        assert!(settings.validate().is_ok());

        settings.override_file_name = "fixtures/run.toml".to_string();
        assert!(matches!(settings.validate(), Err(PipelineError::Argument(_))));

        settings.override_file_name = "run.toml".to_string();
        settings.workspace_root = PathBuf::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_override_file_location() {
        let settings = Settings::new("/ws", "/tpl");
        assert_eq!(
            settings.override_file(PipelineType::Processing, "simple"),
            PathBuf::from("/tpl/processing/simple/fixtures/run_config.toml")
        );
    }
}
