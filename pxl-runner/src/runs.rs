//! Run directories
//!
//! Each test or smoke execution gets its own `runs/run<N>` directory inside
//! the project workspace, holding the configuration it ran with.

use pxl_core::domain::config::RunConfiguration;
use pxl_core::domain::manifest::RUN_CONFIG_FILE;
use pxl_core::{PipelineError, Result};
use std::path::{Path, PathBuf};

const RUNS_DIR: &str = "runs";

fn run_index(name: &str) -> Option<u32> {
    name.strip_prefix("run")?.parse().ok()
}

fn run_indices(runs_dir: &Path) -> std::io::Result<Vec<u32>> {
    if !runs_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut indices = Vec::new();
    for entry in std::fs::read_dir(runs_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(n) = run_index(&entry.file_name().to_string_lossy()) {
            indices.push(n);
        }
    }
    Ok(indices)
}

/// Creates the next run directory (highest existing index + 1)
pub fn next_run_dir(workspace: &Path) -> Result<PathBuf> {
    let runs_dir = workspace.join(RUNS_DIR);
    let next = run_indices(&runs_dir)
        .map_err(|e| PipelineError::workspace_access(&runs_dir, e))?
        .into_iter()
        .max()
        .map_or(1, |n| n + 1);

    let dir = runs_dir.join(format!("run{}", next));
    std::fs::create_dir_all(&dir).map_err(|e| PipelineError::workspace_access(&dir, e))?;
    Ok(dir)
}

/// Most recent run directory, if any run happened
pub fn latest_run_dir(workspace: &Path) -> Option<PathBuf> {
    let runs_dir = workspace.join(RUNS_DIR);
    let latest = run_indices(&runs_dir).ok()?.into_iter().max()?;
    Some(runs_dir.join(format!("run{}", latest)))
}

/// Writes the resolved configuration into a run directory
pub fn write_run_config(run_dir: &Path, config: &RunConfiguration) -> Result<PathBuf> {
    let path = run_dir.join(RUN_CONFIG_FILE);
    let content = config
        .to_toml_string()
        .map_err(|e| PipelineError::workspace_access(&path, e))?;
    std::fs::write(&path, content).map_err(|e| PipelineError::workspace_access(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pxl_core::domain::config::ParamValue;

    #[test]
    fn test_run_dirs_are_numbered() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(latest_run_dir(tmp.path()).is_none());

        let first = next_run_dir(tmp.path()).unwrap();
        assert!(first.ends_with("runs/run1"));

        std::fs::create_dir_all(tmp.path().join("runs/run7")).unwrap();
        std::fs::create_dir_all(tmp.path().join("runs/runx")).unwrap();

        let next = next_run_dir(tmp.path()).unwrap();
        assert!(next.ends_with("runs/run8"));
        assert_eq!(latest_run_dir(tmp.path()), Some(next));
    }

    #[test]
    fn test_write_run_config() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = RunConfiguration::default();
        config.parameters.insert("epochs".into(), ParamValue::Int(3));

        let path = write_run_config(tmp.path(), &config).unwrap();
        let written: toml::Table = std::fs::read_to_string(path).unwrap().parse().unwrap();
        assert_eq!(written["parameters"]["epochs"].as_integer(), Some(3));
    }
}
