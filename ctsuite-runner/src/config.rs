//! Suite configuration
//!
//! Everything a run needs is held in an explicit [`SuiteConfig`] built once
//! at startup and handed to each component: the platform location, the
//! experiment matrix, polling bounds and validation paths. Credentials are
//! resolved separately so they never end up in the persisted config.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use ctsuite_core::domain::experiment::Experiment;

/// Environment variable pinning the software version under test
pub const VERSION_ENV: &str = "CT_VERSION";
/// Environment variables holding credentials when no file is given
pub const USERNAME_ENV: &str = "TAPIS_USERNAME";
pub const PASSWORD_ENV: &str = "TAPIS_PASSWORD";

/// Credentials file tried when none is named explicitly
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";

/// Dataset used when the config names none
const DEFAULT_DATASET: &str = "default";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid suite config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No credentials: provide a credentials file or set TAPIS_USERNAME and TAPIS_PASSWORD")]
    MissingCredentials,

    #[error("{0}")]
    Invalid(String),
}

/// Suite configuration, usually loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Tenant base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// System holding the job archives
    #[serde(default = "default_archive_system")]
    pub archive_system: String,

    #[serde(default)]
    pub app: AppConfig,

    /// Model ids under test
    pub models: Vec<String>,

    /// Device name to the site(s) it is provisioned at
    pub devices: BTreeMap<String, Sites>,

    /// Dataset name to its input locations
    #[serde(default)]
    pub datasets: BTreeMap<String, DatasetConfig>,

    /// Free-form variables forwarded to the app in the advanced options blob
    #[serde(default)]
    pub custom_app_vars: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub polling: PollConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    /// Max experiments in flight at once
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Software version pin, taken from `CT_VERSION`
    #[serde(skip)]
    pub version_pin: Option<String>,
}

/// Target application on the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub id: String,
    pub version: String,
    /// Controller config path inside the job
    pub config_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            id: "cameratraps-test".to_string(),
            version: "0.1".to_string(),
            config_path: "/config.yml".to_string(),
        }
    }
}

/// One or many sites for a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sites {
    One(String),
    Many(Vec<String>),
}

impl Sites {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let sites: &[String] = match self {
            Sites::One(site) => std::slice::from_ref(site),
            Sites::Many(sites) => sites,
        };
        sites.iter().map(String::as_str)
    }
}

/// Input locations of a dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub ground_truth_url: Option<String>,
}

/// Polling bounds, in seconds on disk
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub max_wait_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_wait_secs: 3600,
        }
    }
}

impl PollConfig {
    pub fn settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.interval_secs),
            max_wait: Duration::from_secs(self.max_wait_secs),
        }
    }
}

/// Polling bounds used by the completion poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Fixed delay between two status queries
    pub interval: Duration,
    /// Total wait budget before giving up
    pub max_wait: Duration,
}

/// Where the validators look and what they look for
///
/// Paths are relative to the job's archive directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub images_dir: String,
    pub power_report: String,
    pub ckn_event_log: String,
    pub ckn_event_marker: String,
    /// Job output log scanned when a job fails
    pub job_output_log: String,
    /// Marker identifying a transient provisioning failure
    pub transient_failure_marker: String,
    /// Devices that finish too fast for the power monitor to sample
    pub fast_devices: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            images_dir: "ct_run/images_output_dir".to_string(),
            power_report: "ct_run/power_output_dir/power_summary_report.json".to_string(),
            ckn_event_log: "ct_run/ckn_output_dir/events.log".to_string(),
            ckn_event_marker: "CKN_EVENT".to_string(),
            job_output_log: "tapisjob.out".to_string(),
            transient_failure_marker: "try again later".to_string(),
            fast_devices: Vec::new(),
        }
    }
}

fn default_base_url() -> String {
    "https://icicleai.develop.tapis.io".to_string()
}

fn default_archive_system() -> String {
    "icicledev-test".to_string()
}

fn default_max_parallel() -> usize {
    4
}

impl SuiteConfig {
    /// Creates a configuration for a single model/device/site with defaults
    pub fn new(
        model: impl Into<String>,
        device: impl Into<String>,
        site: impl Into<String>,
    ) -> Self {
        let mut devices = BTreeMap::new();
        devices.insert(device.into(), Sites::One(site.into()));
        Self {
            base_url: default_base_url(),
            archive_system: default_archive_system(),
            app: AppConfig::default(),
            models: vec![model.into()],
            devices,
            datasets: BTreeMap::new(),
            custom_app_vars: BTreeMap::new(),
            polling: PollConfig::default(),
            validation: ValidationConfig::default(),
            max_parallel: default_max_parallel(),
            version_pin: None,
        }
    }

    /// Parses a YAML document
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Loads the YAML file at `path`, applies environment overrides and
    /// validates the result
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&raw)?.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from the process environment
    ///
    /// Expected environment variables:
    /// - CT_VERSION (optional): software version pin
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(version) = std::env::var(VERSION_ENV).ok().filter(|v| !v.is_empty()) {
            self.version_pin = Some(version);
        }
        self
    }

    /// Pins the software version under test
    pub fn with_version_pin(mut self, version: impl Into<String>) -> Self {
        self.version_pin = Some(version.into());
        self
    }

    /// Adds a dataset
    pub fn with_dataset(mut self, name: impl Into<String>, dataset: DatasetConfig) -> Self {
        self.datasets.insert(name.into(), dataset);
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return invalid("base_url must start with http:// or https://");
        }

        if self.archive_system.is_empty() {
            return invalid("archive_system cannot be empty");
        }

        if self.models.is_empty() {
            return invalid("at least one model is required");
        }

        if self.devices.is_empty() {
            return invalid("at least one device is required");
        }

        if self.devices.values().any(|sites| sites.iter().next().is_none()) {
            return invalid("every device needs at least one site");
        }

        if self.polling.interval_secs == 0 {
            return invalid("polling.interval_secs must be greater than 0");
        }

        if self.polling.max_wait_secs < self.polling.interval_secs {
            return invalid("polling.max_wait_secs must be at least polling.interval_secs");
        }

        if self.max_parallel == 0 {
            return invalid("max_parallel must be greater than 0");
        }

        let mut keys = HashSet::new();
        for experiment in self.experiments() {
            let key = experiment.key();
            if !keys.insert(key.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "experiment key {} is produced by more than one (model, device, site, dataset)",
                    key
                )));
            }
        }

        Ok(())
    }

    /// Dataset names, falling back to a single unnamed dataset
    pub fn dataset_names(&self) -> Vec<&str> {
        if self.datasets.is_empty() {
            vec![DEFAULT_DATASET]
        } else {
            self.datasets.keys().map(String::as_str).collect()
        }
    }

    /// Expands the experiment matrix: models × (device, site) × datasets
    pub fn experiments(&self) -> Vec<Experiment> {
        let datasets = self.dataset_names();
        let mut experiments = Vec::new();

        for model in &self.models {
            for (device, sites) in &self.devices {
                for site in sites.iter() {
                    for dataset in &datasets {
                        experiments.push(Experiment::new(model, device, site, *dataset));
                    }
                }
            }
        }

        experiments
    }

    /// Finds an experiment of the matrix by its key
    pub fn find_experiment(&self, key: &str) -> Option<Experiment> {
        self.experiments().into_iter().find(|e| e.key() == key)
    }

    /// Input locations for a dataset, empty when it is not configured
    pub fn dataset(&self, name: &str) -> DatasetConfig {
        self.datasets.get(name).cloned().unwrap_or_default()
    }

    /// Whether power sampling is known to be unreliable on `device`
    pub fn is_fast_device(&self, device: &str) -> bool {
        self.validation.fast_devices.iter().any(|d| d == device)
    }
}

/// Platform credentials
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Reads `{"username": ..., "password": ...}` from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let credentials: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        credentials.non_empty()
    }

    /// Reads `TAPIS_USERNAME` and `TAPIS_PASSWORD`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Reads the credential variables through `lookup`
    ///
    /// Unset and blank values are both [`ConfigError::MissingCredentials`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).ok_or(ConfigError::MissingCredentials);
        Self {
            username: var(USERNAME_ENV)?,
            password: var(PASSWORD_ENV)?,
        }
        .non_empty()
    }

    /// Resolves credentials from a file or the environment
    ///
    /// An explicit `path` wins when it exists; a missing one is reported
    /// and the environment is used instead. Without a path the default
    /// file is tried quietly.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve_with(path, env_lookup)
    }

    pub fn resolve_with(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        match path {
            Some(path) if path.exists() => Self::from_file(path),
            Some(path) => {
                warn!(
                    "Credentials file {} not found, using {} and {}",
                    path.display(),
                    USERNAME_ENV,
                    PASSWORD_ENV
                );
                Self::from_lookup(lookup)
            }
            None => {
                let default = Path::new(DEFAULT_CREDENTIALS_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Self::from_lookup(lookup)
                }
            }
        }
    }

    fn non_empty(self) -> Result<Self, ConfigError> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        Ok(self)
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
