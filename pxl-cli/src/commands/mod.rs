//! Commands module
//!
//! Defines all CLI commands and their handlers. Handlers return the process
//! exit status; errors escaping them are mapped in `main`.

mod run;
mod sync;
mod workspace;

pub use run::RunArgs;

use anyhow::Result;
use clap::Subcommand;
use run::SingleOptions;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run phases over one template or every template of a type
    Run(RunArgs),
    /// Scaffold a project from a template (phase init only)
    Init {
        /// Pipeline type (processing or training)
        pipeline_type: String,

        /// Template name
        template: String,

        /// Project name, when it should differ from the template name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Run a project locally against the platform (phase test only)
    Test {
        /// Pipeline type (processing or training)
        pipeline_type: String,

        /// Project name
        name: String,

        /// Start from the latest run configuration instead of run_config.toml
        #[arg(long)]
        reuse_run: bool,
    },
    /// Build the project image and run it in a container (phase smoke only)
    SmokeTest {
        /// Pipeline type (processing or training)
        pipeline_type: String,

        /// Project name
        name: String,
    },
    /// Build, push and register a new version (phase deploy only)
    Deploy {
        /// Pipeline type (processing or training)
        pipeline_type: String,

        /// Project name
        name: String,

        /// Version bump: patch, minor, major, rc or final
        #[arg(short, long, default_value = "final")]
        bump: String,
    },
    /// Push the schema defaults of a deployed project to the platform
    Sync {
        /// Pipeline type (processing or training)
        pipeline_type: String,

        /// Project name
        name: String,
    },
    /// List project workspaces and available templates
    List {
        /// Restrict to one pipeline type
        pipeline_type: Option<String>,
    },
    /// Delete a project workspace
    Remove {
        /// Pipeline type (processing or training)
        pipeline_type: String,

        /// Project name
        name: String,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Returns
/// The process exit status
pub async fn handle_command(command: Commands, config: &Config) -> Result<i32> {
    match command {
        Commands::Run(args) => run::handle_run(args, config).await,
        Commands::Init {
            pipeline_type,
            template,
            name,
        } => run::handle_init(&pipeline_type, &template, name.as_deref(), config).await,
        Commands::Test {
            pipeline_type,
            name,
            reuse_run,
        } => {
            let options = SingleOptions {
                reuse_last_run: reuse_run,
                ..Default::default()
            };
            run::handle_single(&pipeline_type, &name, "test", options, config).await
        }
        Commands::SmokeTest {
            pipeline_type,
            name,
        } => {
            let options = SingleOptions::default();
            run::handle_single(&pipeline_type, &name, "smoke", options, config).await
        }
        Commands::Deploy {
            pipeline_type,
            name,
            bump,
        } => {
            let options = SingleOptions {
                bump: &bump,
                ..Default::default()
            };
            run::handle_single(&pipeline_type, &name, "deploy", options, config).await
        }
        Commands::Sync {
            pipeline_type,
            name,
        } => sync::handle_sync(&pipeline_type, &name, config).await,
        Commands::List { pipeline_type } => {
            workspace::handle_list(pipeline_type.as_deref(), config)
        }
        Commands::Remove {
            pipeline_type,
            name,
        } => workspace::handle_remove(&pipeline_type, &name, config),
    }
}
