//! Pxl Pipeline CLI
//!
//! Command-line interface driving pipeline projects through
//! `init -> test -> smoke -> deploy`, plus `sync` of deployed defaults.
//!
//! The exit status is the integration point for automation: 0 when nothing
//! failed (an empty selection included), 1 when any project failed, 2 for a
//! malformed invocation and 3 for an invalid parameter schema.

mod commands;
mod config;
mod console;

use anyhow::Result;
use clap::Parser;
use colored::*;
use commands::{Commands, handle_command};
use config::{Config, GlobalArgs};
use pxl_core::PipelineError;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pxl-pipeline")]
#[command(
    about = "Pipeline lifecycle manager: scaffold, test, smoke-test and deploy",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Diagnostics go to stderr; the report owns stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pxl_runner=warn,pxl_client=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => exit_code(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            exit_code(failure_code(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config = Config::load(&cli.global)?;
    handle_command(cli.command, &config).await
}

/// Exit status for an error that escaped every command handler
fn failure_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<PipelineError>()
        .map(PipelineError::exit_code)
        .unwrap_or(1)
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
