//! Pxl Runner
//!
//! Drives pipeline projects through their lifecycle phases.
//!
//! Architecture:
//! - Settings: workspace and templates roots, container engine, report path
//! - Resolver: turns a raw run configuration into a typed one
//! - Workspace: per-project directories under an explicit root
//! - Machine: the ordered `init -> test -> smoke -> deploy` chain for one project
//! - Batch: project selection, per-project execution and aggregation
//! - Report: user-facing lines fanned out to console, file and memory sinks
//! - Services: the external collaborators (scaffolding, execution, publishing)
//!
//! Execution is sequential. A project's chain stops at its first failure,
//! and a batch always moves on to the next project.

pub mod batch;
pub mod machine;
mod process;
pub mod report;
pub mod resolver;
pub mod runs;
pub mod service;
pub mod settings;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use batch::{BatchRequest, BatchRunner, ProjectSelector};
pub use machine::{PhaseMachine, PhaseRequest};
pub use report::{FileSink, ReportSink, Reporter};
pub use settings::{ContainerEngine, Settings};
pub use workspace::WorkspaceManager;
