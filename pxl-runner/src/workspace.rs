//! Workspace management
//!
//! Every project owns one directory under an explicit workspace root:
//! `<root>/<type>/<name>`. Filesystem work for a project happens inside an
//! entered scope; entering pushes the root onto a stack and dropping the
//! guard pops it again, whatever path the caller leaves by.

use pxl_core::domain::manifest::RUN_CONFIG_FILE;
use pxl_core::domain::phase::Phase;
use pxl_core::domain::project::{PipelineProject, PipelineType};
use pxl_core::{PipelineError, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Owner of the shared workspace root
pub struct WorkspaceManager {
    root: PathBuf,

    /// Stack of entered roots (top = current scope)
    stack: Mutex<Vec<PathBuf>>,
}

/// A prepared project directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceHandle {
    pub project: PipelineProject,
    pub path: PathBuf,
}

impl WorkspaceHandle {
    /// Working run configuration of the project
    pub fn run_config(&self) -> PathBuf {
        self.path.join(RUN_CONFIG_FILE)
    }
}

/// What `apply_override` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideOutcome {
    Applied(PathBuf),
    Absent,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stack: Mutex::new(Vec::new()),
        }
    }

    /// Directory owned by a project
    pub fn project_dir(&self, project: &PipelineProject) -> PathBuf {
        self.root
            .join(project.pipeline_type.as_str())
            .join(&project.name)
    }

    pub fn exists(&self, project: &PipelineProject) -> bool {
        self.project_dir(project).is_dir()
    }

    /// Enters the workspace root
    ///
    /// The root is created when missing. The returned guard restores the
    /// previous scope when dropped.
    pub fn enter(&self) -> Result<WorkspaceGuard<'_>> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| PipelineError::workspace_access(&self.root, e))?;

        let root = self
            .root
            .canonicalize()
            .map_err(|e| PipelineError::workspace_access(&self.root, e))?;

        let mut stack = self.stack.lock().unwrap_or_else(|e| e.into_inner());
        stack.push(root.clone());
        debug!("Entered workspace {} (depth {})", root.display(), stack.len());

        Ok(WorkspaceGuard {
            manager: self,
            root,
        })
    }

    /// Root of the innermost entered scope, if any
    #[cfg(test)]
    pub(crate) fn current(&self) -> Option<PathBuf> {
        self.stack
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.stack.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Deletes a project workspace
    ///
    /// Returns whether there was anything to delete.
    pub fn remove(&self, project: &PipelineProject) -> Result<bool> {
        let guard = self.enter()?;
        let dir = guard.project_dir(project);

        if !dir.exists() {
            return Ok(false);
        }

        std::fs::remove_dir_all(&dir).map_err(|e| PipelineError::workspace_access(&dir, e))?;
        info!("Removed workspace {}", dir.display());
        Ok(true)
    }

    /// Names of the existing project workspaces of a type, sorted
    pub fn list(&self, pipeline_type: PipelineType) -> Result<Vec<String>> {
        subdirectory_names(&self.root.join(pipeline_type.as_str()))
    }
}

/// Scoped access to the workspace root
///
/// Pops the stack entry pushed by `WorkspaceManager::enter` on drop.
pub struct WorkspaceGuard<'a> {
    manager: &'a WorkspaceManager,
    root: PathBuf,
}

impl WorkspaceGuard<'_> {
    /// The entered root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, project: &PipelineProject) -> PathBuf {
        self.root
            .join(project.pipeline_type.as_str())
            .join(&project.name)
    }

    /// Prepares a project directory for a phase
    ///
    /// For `init` any previous directory is deleted and recreated empty.
    /// Every other phase requires the directory to exist already; it is
    /// never created implicitly.
    pub fn prepare(&self, project: &PipelineProject, phase: Phase) -> Result<WorkspaceHandle> {
        let path = self.project_dir(project);

        if phase.requires_workspace() {
            if !path.is_dir() {
                return Err(PipelineError::MissingWorkspace {
                    project: project.display_name(),
                    path,
                });
            }
            debug!("Reusing workspace {}", path.display());
        } else {
            if path.exists() {
                info!("Deleting previous workspace {}", path.display());
                std::fs::remove_dir_all(&path)
                    .map_err(|e| PipelineError::workspace_access(&path, e))?;
            }
            std::fs::create_dir_all(&path)
                .map_err(|e| PipelineError::workspace_access(&path, e))?;
        }

        Ok(WorkspaceHandle {
            project: project.clone(),
            path,
        })
    }

    /// Copies an override configuration over the project's run configuration
    ///
    /// A missing override is not an error. An override that exists but
    /// cannot be copied is.
    pub fn apply_override(
        &self,
        handle: &WorkspaceHandle,
        override_file: Option<&Path>,
    ) -> Result<OverrideOutcome> {
        let Some(source) = override_file.filter(|p| p.exists()) else {
            return Ok(OverrideOutcome::Absent);
        };

        let target = handle.run_config();
        std::fs::copy(source, &target).map_err(|e| PipelineError::ConfigOverride {
            path: source.to_path_buf(),
            source: e,
        })?;

        debug!(
            "Copied override {} to {}",
            source.display(),
            target.display()
        );
        Ok(OverrideOutcome::Applied(source.to_path_buf()))
    }
}

impl Drop for WorkspaceGuard<'_> {
    fn drop(&mut self) {
        let mut stack = self
            .manager
            .stack
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(pos) = stack.iter().rposition(|p| p == &self.root) {
            stack.remove(pos);
        }
        debug!("Left workspace {} (depth {})", self.root.display(), stack.len());
    }
}

/// Immediate subdirectory names, sorted, dot-directories excluded
pub fn subdirectory_names(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    subdirectories(dir).map_err(|e| PipelineError::workspace_access(dir, e))
}

fn subdirectories(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}
