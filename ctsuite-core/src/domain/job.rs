//! Job domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote job as observed by the suite
///
/// Created by submission and mutated only by the remote platform. The suite
/// never writes to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Opaque job token issued by the platform
    #[serde(rename = "uuid")]
    pub id: String,
    pub status: JobStatus,
    /// Directory on the archive system holding the job outputs
    #[serde(default, rename = "archiveSystemDir")]
    pub archive_dir: String,
    /// Last status message reported by the platform, if any
    #[serde(default)]
    pub last_message: Option<String>,
}

/// Job status as reported by the platform
///
/// Unknown strings are kept verbatim in [`JobStatus::Other`] so that a new
/// platform status never breaks deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Pending,
    ProcessingInputs,
    StagingInputs,
    StagingJob,
    SubmittingJob,
    Queued,
    Running,
    Archiving,
    Blocked,
    Paused,
    Finished,
    Cancelled,
    Failed,
    Other(String),
}

impl JobStatus {
    /// Whether the job is still making progress on the platform
    ///
    /// Anything outside this set is terminal, including unknown statuses.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            JobStatus::Pending
                | JobStatus::ProcessingInputs
                | JobStatus::StagingInputs
                | JobStatus::StagingJob
                | JobStatus::SubmittingJob
                | JobStatus::Queued
                | JobStatus::Running
                | JobStatus::Archiving
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_in_progress()
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::ProcessingInputs => "PROCESSING_INPUTS",
            JobStatus::StagingInputs => "STAGING_INPUTS",
            JobStatus::StagingJob => "STAGING_JOB",
            JobStatus::SubmittingJob => "SUBMITTING_JOB",
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Archiving => "ARCHIVING",
            JobStatus::Blocked => "BLOCKED",
            JobStatus::Paused => "PAUSED",
            JobStatus::Finished => "FINISHED",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Failed => "FAILED",
            JobStatus::Other(s) => s,
        }
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PENDING" => JobStatus::Pending,
            "PROCESSING_INPUTS" => JobStatus::ProcessingInputs,
            "STAGING_INPUTS" => JobStatus::StagingInputs,
            "STAGING_JOB" => JobStatus::StagingJob,
            "SUBMITTING_JOB" => JobStatus::SubmittingJob,
            "QUEUED" => JobStatus::Queued,
            "RUNNING" => JobStatus::Running,
            "ARCHIVING" => JobStatus::Archiving,
            "BLOCKED" => JobStatus::Blocked,
            "PAUSED" => JobStatus::Paused,
            "FINISHED" => JobStatus::Finished,
            "CANCELLED" => JobStatus::Cancelled,
            "FAILED" => JobStatus::Failed,
            _ => JobStatus::Other(s),
        }
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        JobStatus::from(s.to_string())
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
