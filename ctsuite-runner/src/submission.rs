//! Submission builder
//!
//! Turns an experiment into the job descriptor the platform expects. Pure
//! data transformation: no I/O, no error paths.

use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

use ctsuite_core::domain::experiment::Experiment;
use ctsuite_core::dto::submission::{ArchiveFilter, EnvVariable, JobSubmission, ParameterSet};

use crate::config::{AppConfig, SuiteConfig, VERSION_ENV};

/// Longest job name the platform accepts
pub const MAX_NAME_LEN: usize = 64;

/// Accelerator board that runs inference on its integrated GPU
pub const ACCELERATOR_DEVICE: &str = "Jetson";

/// Whether the controller should enable the GPU on `device`
pub fn enable_gpu(device: &str) -> bool {
    device.contains("gpu") || device == ACCELERATOR_DEVICE
}

/// Truncates a job name to [`MAX_NAME_LEN`] characters
pub fn truncate_name(name: &str) -> String {
    name.chars().take(MAX_NAME_LEN).collect()
}

/// Optional per-experiment inputs forwarded to the controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvancedVars {
    pub image_url: Option<String>,
    pub ground_truth_url: Option<String>,
    /// Software version pin
    pub version: Option<String>,
}

impl AdvancedVars {
    /// Inputs for `experiment` as configured in `config`
    pub fn for_experiment(config: &SuiteConfig, experiment: &Experiment) -> Self {
        let dataset = config.dataset(&experiment.dataset);
        Self {
            image_url: dataset.image_url,
            ground_truth_url: dataset.ground_truth_url,
            version: config.version_pin.clone(),
        }
    }
}

/// Builds job submissions for one application
#[derive(Debug, Clone)]
pub struct SubmissionBuilder {
    app: AppConfig,
    custom_app_vars: BTreeMap<String, JsonValue>,
}

impl SubmissionBuilder {
    pub fn new(app: AppConfig, custom_app_vars: BTreeMap<String, JsonValue>) -> Self {
        Self {
            app,
            custom_app_vars,
        }
    }

    pub fn from_config(config: &SuiteConfig) -> Self {
        Self::new(config.app.clone(), config.custom_app_vars.clone())
    }

    /// Builds the descriptor for `experiment`
    pub fn build(&self, experiment: &Experiment, advanced: &AdvancedVars) -> JobSubmission {
        let Experiment {
            model_id,
            device,
            site,
            ..
        } = experiment;

        let mut env = vec![
            EnvVariable::new("CT_CONTROLLER_TARGET_SITE", site),
            EnvVariable::new("CT_CONTROLLER_NODE_TYPE", device),
            EnvVariable::new("CT_CONTROLLER_GPU", enable_gpu(device).to_string()),
            EnvVariable::new("CT_CONTROLLER_MODEL", model_id),
            EnvVariable::new("CT_CONTROLLER_CONFIG_PATH", &self.app.config_path),
        ];

        if let Some(url) = &advanced.image_url {
            env.push(EnvVariable::new("CT_CONTROLLER_INPUT", url));
        }
        if let Some(url) = &advanced.ground_truth_url {
            env.push(EnvVariable::new("CT_CONTROLLER_GROUND_TRUTH", url));
        }

        env.push(EnvVariable::new(
            "CT_CONTROLLER_ADVANCED",
            self.advanced_blob(advanced),
        ));

        JobSubmission {
            name: truncate_name(&format!("testsuite_{}_{}_{}", site, device, model_id)),
            description: format!(
                "Invoke ctcontroller to run camera-traps on {} {}",
                site, device
            ),
            app_id: self.app.id.clone(),
            app_version: self.app.version.clone(),
            parameter_set: ParameterSet { env_variables: env },
            archive_filter: ArchiveFilter::default(),
        }
    }

    /// Serializes the custom app variables plus the version pin
    fn advanced_blob(&self, advanced: &AdvancedVars) -> String {
        let mut blob: Map<String, JsonValue> = self
            .custom_app_vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if let Some(version) = &advanced.version {
            blob.insert(VERSION_ENV.to_string(), JsonValue::String(version.clone()));
        }

        JsonValue::Object(blob).to_string()
    }
}
