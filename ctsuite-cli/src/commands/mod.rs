//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod experiment;
mod run;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run every experiment of the matrix and validate the results
    Run {
        /// Print the report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List the experiment matrix and any logged job ids
    List,
    /// Show the logged job of an experiment and its current status
    Status {
        /// Experiment key, as printed by `list`
        key: String,
    },
    /// Print the submission descriptor of an experiment without submitting it
    Submission {
        /// Experiment key, as printed by `list`
        key: String,
    },
}

/// Handle a CLI command
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run { json } => run::run_suite(config, json).await,
        Commands::List => experiment::list_experiments(config).await,
        Commands::Status { key } => experiment::show_status(config, &key).await,
        Commands::Submission { key } => experiment::show_submission(config, &key),
    }
}
