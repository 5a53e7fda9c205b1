//! Job submission descriptor

use serde::{Deserialize, Serialize};

/// Request body for the platform's job submission endpoint
///
/// The same value is persisted next to the job id in the experiment log so a
/// resumed run can show exactly what was submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmission {
    pub name: String,
    pub description: String,
    pub app_id: String,
    pub app_version: String,
    pub parameter_set: ParameterSet,
    pub archive_filter: ArchiveFilter,
}

impl JobSubmission {
    /// Looks up an environment variable by key
    pub fn env(&self, key: &str) -> Option<&str> {
        self.parameter_set
            .env_variables
            .iter()
            .find(|v| v.key == key)
            .map(|v| v.value.as_str())
    }
}

/// Parameters passed to the remote application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSet {
    pub env_variables: Vec<EnvVariable>,
}

/// A single `key=value` environment variable for the remote job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVariable {
    pub key: String,
    pub value: String,
}

impl EnvVariable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Controls which files the platform archives after the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveFilter {
    pub include_launch_files: bool,
}

impl Default for ArchiveFilter {
    fn default() -> Self {
        Self {
            include_launch_files: false,
        }
    }
}
