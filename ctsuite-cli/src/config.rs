//! Configuration module
//!
//! Resolves the files named on the command line into the objects the runner
//! needs: suite config, expected values, log store and an authenticated
//! platform client.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use ctsuite_client::TapisClient;
use ctsuite_core::domain::expected::ExpectedValues;
use ctsuite_runner::{Credentials, FileLogStore, SuiteConfig};

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub suite_path: PathBuf,
    pub expected_path: PathBuf,
    pub log_dir: PathBuf,
    /// Explicit credentials file, if one was named
    pub credentials_path: Option<PathBuf>,
}

impl Config {
    /// Loads and validates the suite configuration
    pub fn load_suite(&self) -> Result<SuiteConfig> {
        SuiteConfig::load(&self.suite_path)
            .with_context(|| format!("Failed to load {}", self.suite_path.display()))
    }

    /// Loads the expected values table; a missing file yields an empty table
    pub fn load_expected(&self) -> Result<ExpectedValues> {
        load_expected(&self.expected_path)
    }

    pub fn store(&self) -> FileLogStore {
        FileLogStore::new(&self.log_dir)
    }

    /// Builds a platform client and authenticates it
    pub async fn connect(&self, suite: &SuiteConfig) -> Result<TapisClient> {
        let credentials = Credentials::resolve(self.credentials_path.as_deref())
            .context("Failed to resolve credentials")?;

        let client = TapisClient::new(&suite.base_url, &suite.archive_system);
        client
            .authenticate(&credentials.username, &credentials.password)
            .await
            .with_context(|| format!("Failed to authenticate as {}", credentials.username))?;

        info!("Authenticated against {}", suite.base_url);
        Ok(client)
    }
}

fn load_expected(path: &Path) -> Result<ExpectedValues> {
    if !path.exists() {
        warn!(
            "No expected values at {}, count checks will be skipped",
            path.display()
        );
        return Ok(ExpectedValues::default());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    ExpectedValues::from_json(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}
