//! Workspace command handlers
//!
//! Listing and explicit removal. `remove` is the only deletion besides a
//! re-run of `init`.

use anyhow::Result;
use colored::*;
use pxl_core::domain::project::{PipelineProject, PipelineType, validate_project_name};
use pxl_core::domain::result::EXIT_SUCCESS;
use pxl_runner::WorkspaceManager;
use pxl_runner::service::TemplateScaffolder;
use pxl_runner::workspace::subdirectory_names;

use crate::config::Config;

/// List workspaces, fixture directories and built-in templates
pub fn handle_list(pipeline_type: Option<&str>, config: &Config) -> Result<i32> {
    let types = match pipeline_type {
        Some(ty) => vec![ty.parse::<PipelineType>()?],
        None => PipelineType::ALL.to_vec(),
    };

    let manager = WorkspaceManager::new(config.settings.workspace_root.clone());
    let catalogue = TemplateScaffolder::new();

    for ty in types {
        println!("{}", format!("{} pipelines", ty).bold());

        let projects = manager.list(ty)?;
        print_names("Projects", &projects);

        let fixtures = subdirectory_names(&config.settings.templates_dir(ty))?;
        print_names("Fixtures", &fixtures);

        let templates: Vec<String> = catalogue.names(ty).into_iter().map(String::from).collect();
        print_names("Templates", &templates);
        println!();
    }

    Ok(EXIT_SUCCESS)
}

fn print_names(label: &str, names: &[String]) {
    if names.is_empty() {
        println!("  {:<10} {}", label, "none".dimmed());
    } else {
        println!("  {:<10} {}", label, names.join(", "));
    }
}

/// Delete one project workspace
pub fn handle_remove(pipeline_type: &str, name: &str, config: &Config) -> Result<i32> {
    let ty: PipelineType = pipeline_type.parse()?;
    validate_project_name(name)?;

    let manager = WorkspaceManager::new(config.settings.workspace_root.clone());
    let project = PipelineProject::new(name, ty, name);

    if manager.remove(&project)? {
        println!("{} Removed {}", "✓".green(), project.display_name().bold());
    } else {
        println!(
            "{}",
            format!("No workspace for {}; nothing removed.", project.display_name()).yellow()
        );
    }

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalArgs;
    use pxl_core::PipelineError;
    use tempfile::TempDir;

    fn config(tmp: &TempDir) -> Config {
        let args = GlobalArgs {
            workspace_root: Some(tmp.path().to_path_buf()),
            templates_root: Some(tmp.path().join("templates")),
            ..Default::default()
        };
        Config::load_with(&args, |_| None).unwrap()
    }

    #[test]
    fn test_remove_deletes_only_the_named_project() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("processing/cleaner")).unwrap();
        std::fs::create_dir_all(tmp.path().join("processing/other")).unwrap();

        assert_eq!(handle_remove("processing", "cleaner", &config(&tmp)).unwrap(), 0);
        assert!(!tmp.path().join("processing/cleaner").exists());
        assert!(tmp.path().join("processing/other").exists());

        // Second removal is a no-op
        assert_eq!(handle_remove("processing", "cleaner", &config(&tmp)).unwrap(), 0);
    }

    #[test]
    fn test_remove_rejects_path_names() {
        let tmp = TempDir::new().unwrap();
        let err = handle_remove("processing", "../escape", &config(&tmp)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Argument(_))
        ));
    }

    #[test]
    fn test_list_without_any_directory() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(handle_list(None, &config(&tmp)).unwrap(), 0);
        assert!(handle_list(Some("inference"), &config(&tmp)).is_err());
    }
}
