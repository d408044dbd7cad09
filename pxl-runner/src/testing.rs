//! Collaborator stubs for tests

use async_trait::async_trait;
use pxl_client::{Registration, SyncOutcome};
use pxl_core::domain::log::ReportLine;
use pxl_core::domain::manifest::{RUN_CONFIG_FILE, SCHEMA_FILE};
use pxl_core::domain::project::{PipelineProject, PipelineType};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::report::{ReportSink, render};
use crate::service::{
    Collaborators, CollaboratorError, CollaboratorResult, ContainerExecutor, ExecutionContext,
    LocalExecutor, PublishOutcome, PublishRequest, Publisher, Scaffolder, SyncRequest,
};

pub const VALID_SCHEMA: &str = r#"
[[parameter]]
name = "batch_size"
type = "int"
default = 8
"#;

pub const SCHEMA_WITHOUT_DEFAULT: &str = r#"
[[parameter]]
name = "epochs"
type = "int"
"#;

pub const DEFAULT_RUN_CONFIG: &str = r#"
[job]
type = "DATASET_VERSION_CREATION"

[input]
dataset_version = "0189-abc"

[parameters]
batch_size = 4
"#;

/// Ordered record of collaborator calls, shared by every stub
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, call: &str) -> bool {
        self.calls().iter().any(|c| c == call)
    }
}

/// Configurable set of stub collaborators
#[derive(Clone)]
pub struct Stubs {
    pub log: CallLog,
    /// Project names whose scaffolding fails
    pub fail_init: Vec<String>,
    pub fail_local: bool,
    pub fail_container: bool,
    pub fail_publish: bool,
    pub fail_sync: bool,
    /// Whether the platform knows the pipeline when syncing
    pub registered: bool,
    /// Schema written by the scaffolder
    pub schema: String,
}

impl Stubs {
    pub fn new() -> Self {
        Self {
            log: CallLog::default(),
            fail_init: Vec::new(),
            fail_local: false,
            fail_container: false,
            fail_publish: false,
            fail_sync: false,
            registered: true,
            schema: VALID_SCHEMA.to_string(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        let stubs = Arc::new(self.clone());
        Collaborators {
            scaffolder: stubs.clone(),
            local: stubs.clone(),
            container: stubs.clone(),
            publisher: stubs,
        }
    }
}

fn fail(what: &str) -> CollaboratorError {
    CollaboratorError::with_exit_code(format!("{} failed", what), Some(1))
}

#[async_trait]
impl Scaffolder for Stubs {
    fn has_template(&self, _pipeline_type: PipelineType, template: &str) -> bool {
        template != "unknown"
    }

    async fn generate(&self, project: &PipelineProject, workspace: &Path) -> CollaboratorResult {
        self.log.record(format!("init:{}", project.name));
        if self.fail_init.contains(&project.name) {
            return Err(fail("scaffolding"));
        }
        std::fs::write(workspace.join(SCHEMA_FILE), &self.schema).unwrap();
        std::fs::write(workspace.join(RUN_CONFIG_FILE), DEFAULT_RUN_CONFIG).unwrap();
        Ok(())
    }
}

#[async_trait]
impl LocalExecutor for Stubs {
    async fn run(&self, ctx: &ExecutionContext<'_>) -> CollaboratorResult {
        assert!(ctx.run_config_path.is_file());
        self.log.record(format!("local:{}", ctx.project.name));
        if self.fail_local {
            return Err(fail("local run"));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerExecutor for Stubs {
    async fn build_and_run(&self, ctx: &ExecutionContext<'_>) -> CollaboratorResult {
        self.log.record(format!("container:{}", ctx.project.name));
        if self.fail_container {
            return Err(fail("container run"));
        }
        Ok(())
    }
}

#[async_trait]
impl Publisher for Stubs {
    async fn build_push_register(
        &self,
        req: &PublishRequest<'_>,
    ) -> CollaboratorResult<PublishOutcome> {
        self.log
            .record(format!("publish:{}:{}", req.project.name, req.bump));
        if self.fail_publish {
            return Err(fail("publish"));
        }
        Ok(PublishOutcome {
            version: "0.1.1".to_string(),
            tags: vec!["0.1.1".to_string(), "latest".to_string()],
            registration: Registration::Created,
        })
    }

    async fn sync_parameters(&self, req: &SyncRequest<'_>) -> CollaboratorResult<SyncOutcome> {
        self.log.record(format!("sync:{}", req.project.name));
        if self.fail_sync {
            return Err(fail("sync"));
        }
        if !self.registered {
            return Ok(SyncOutcome::NotRegistered);
        }
        Ok(SyncOutcome::Synced)
    }
}

/// Every file under `dir` with its content, keyed by relative path
pub fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries {
            let path = entry.unwrap().path();
            if path.is_dir() {
                out.insert(path.strip_prefix(root).unwrap().to_path_buf(), Vec::new());
                walk(root, &path, out);
            } else {
                let content = std::fs::read(&path).unwrap();
                out.insert(path.strip_prefix(root).unwrap().to_path_buf(), content);
            }
        }
    }

    let mut out = BTreeMap::new();
    walk(dir, dir, &mut out);
    out
}

/// Sink keeping lines in memory
///
/// Clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<ReportLine>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<ReportLine> {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Lines as rendered text
    pub fn rendered(&self) -> Vec<String> {
        self.lines().iter().map(render).collect()
    }
}

impl ReportSink for MemorySink {
    fn write(&mut self, line: &ReportLine) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line.clone());
    }
}
