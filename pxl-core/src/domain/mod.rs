//! Core domain types
//!
//! These types describe pipeline projects and the lifecycle they go through.
//! They are shared between the runner (which executes phases) and the CLI
//! (which parses invocations and prints reports).

pub mod auth;
pub mod config;
pub mod log;
pub mod manifest;
pub mod phase;
pub mod project;
pub mod result;
pub mod version;
