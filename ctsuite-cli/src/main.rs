//! CT Suite CLI
//!
//! Command-line interface for running camera-trap test experiments on the
//! remote job platform and inspecting their logged jobs.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log filter used when RUST_LOG is unset
const DEFAULT_LOG_FILTER: &str = "ctsuite=info,ctsuite_runner=info,ctsuite_client=info";

#[derive(Parser)]
#[command(name = "ctsuite")]
#[command(about = "Camera-traps end-to-end test suite", long_about = None)]
struct Cli {
    /// Suite configuration (YAML)
    #[arg(long, env = "CTSUITE_CONFIG", default_value = "suite.yml")]
    config: PathBuf,

    /// Expected values table (JSON)
    #[arg(long, env = "CTSUITE_EXPECTED", default_value = "expected_values.json")]
    expected: PathBuf,

    /// Directory holding the experiment log
    #[arg(long, env = "CTSUITE_LOG_DIR", default_value = "experiment_logs")]
    log_dir: PathBuf,

    /// Credentials file (JSON), credentials.json when omitted
    ///
    /// TAPIS_USERNAME and TAPIS_PASSWORD are used when the file is absent.
    #[arg(long, env = "CTSUITE_CREDENTIALS")]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config {
        suite_path: cli.config,
        expected_path: cli.expected,
        log_dir: cli.log_dir,
        credentials_path: cli.credentials,
    };

    handle_command(cli.command, &config).await
}
