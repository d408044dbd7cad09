//! Pxl Core
//!
//! Core types and abstractions for the pxl pipeline lifecycle tool.
//!
//! This crate contains:
//! - Domain types: projects, phases, version bumps, run configuration, results
//! - The error taxonomy shared by the runner and the CLI
//!
//! Note: filesystem and process work lives in the runner, not here.

pub mod domain;
pub mod error;

pub use error::{PipelineError, Result};
