//! Sync command handler
//!
//! Pushes the schema defaults of a deployed project to its registered
//! pipeline without building anything.

use anyhow::Result;
use pxl_core::domain::project::{PipelineProject, PipelineType, validate_project_name};
use pxl_core::domain::result::EXIT_SUCCESS;
use pxl_runner::service::Collaborators;
use pxl_runner::{PhaseMachine, WorkspaceManager};

use super::run::reporter;
use crate::config::Config;

pub async fn handle_sync(pipeline_type: &str, name: &str, config: &Config) -> Result<i32> {
    let ty: PipelineType = pipeline_type.parse()?;
    validate_project_name(name)?;

    let mut reporter = reporter(config)?;
    let machine = PhaseMachine::new(
        WorkspaceManager::new(config.settings.workspace_root.clone()),
        Collaborators::standard(config.settings.container_engine),
        config.auth.clone(),
    );
    let project = PipelineProject::new(name, ty, name);

    reporter.section(format!("{} sync", project.display_name()));
    match machine.sync(&project, &mut reporter).await {
        Ok(_) => Ok(EXIT_SUCCESS),
        Err(e) => {
            reporter.error(format!("{}: {}", project.display_name(), e));
            Ok(e.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalArgs;
    use pxl_core::PipelineError;
    use pxl_core::domain::manifest::SCHEMA_FILE;
    use tempfile::TempDir;

    fn config(tmp: &TempDir) -> Config {
        let args = GlobalArgs {
            workspace_root: Some(tmp.path().join("ws")),
            report_path: Some(tmp.path().join("report.log")),
            ..Default::default()
        };
        Config::load_with(&args, |_| None).unwrap()
    }

    #[tokio::test]
    async fn test_sync_without_workspace_fails() {
        let tmp = TempDir::new().unwrap();

        let code = handle_sync("processing", "simple", &config(&tmp)).await.unwrap();
        assert_eq!(code, 1);

        let report = std::fs::read_to_string(tmp.path().join("report.log")).unwrap();
        assert!(report.contains("run phase init first"));
        assert!(!tmp.path().join("ws/processing/simple").exists());
    }

    #[tokio::test]
    async fn test_sync_with_invalid_schema_exits_with_schema_code() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("ws/processing/simple");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(SCHEMA_FILE), "[[parameter]]\nname = \"epochs\"\ntype = \"int\"\n")
            .unwrap();

        let code = handle_sync("processing", "simple", &config(&tmp)).await.unwrap();
        assert_eq!(code, 3);
    }

    #[tokio::test]
    async fn test_sync_rejects_path_names() {
        let tmp = TempDir::new().unwrap();
        let err = handle_sync("processing", "../simple", &config(&tmp))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Argument(_))
        ));
        assert!(!tmp.path().join("report.log").exists());
    }
}
