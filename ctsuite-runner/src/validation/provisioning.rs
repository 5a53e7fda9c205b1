//! Provisioning validator
//!
//! A job can fail because the target site had no free resources. That is
//! infrastructure flakiness, not a regression, and the experiment is
//! reported as skipped. The platform does not expose a structured error
//! code for it yet, so the distinction is a substring match on the job
//! output, kept behind [`classify_failure`].

use tracing::{info, warn};

use ctsuite_client::RemoteClient;
use ctsuite_core::domain::job::{Job, JobStatus};
use ctsuite_core::domain::outcome::Outcome;

use super::archive_path;

/// Why a job failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Resources were unavailable; retrying later may succeed
    Transient,
    /// Anything else
    Permanent,
}

/// Classifies a failure from the job's output text
///
/// The match is case-insensitive.
pub fn classify_failure(log: &str, marker: &str) -> FailureClass {
    if !marker.is_empty() && log.to_lowercase().contains(&marker.to_lowercase()) {
        FailureClass::Transient
    } else {
        FailureClass::Permanent
    }
}

/// Decides the outcome of a job that did not finish successfully
pub struct ProvisioningValidator<'a> {
    client: &'a dyn RemoteClient,
    output_log: &'a str,
    marker: &'a str,
}

impl<'a> ProvisioningValidator<'a> {
    /// # Arguments
    /// * `client` - Remote client used to read the job output
    /// * `output_log` - Output log path relative to the archive directory
    /// * `marker` - Substring identifying a transient failure
    pub fn new(client: &'a dyn RemoteClient, output_log: &'a str, marker: &'a str) -> Self {
        Self {
            client,
            output_log,
            marker,
        }
    }

    /// Classifies a FAILED job by its last message and output log
    ///
    /// An unreadable log counts as a permanent failure.
    pub async fn classify(&self, job: &Job) -> FailureClass {
        let message = job.last_message.as_deref().unwrap_or_default();
        if classify_failure(message, self.marker) == FailureClass::Transient {
            return FailureClass::Transient;
        }

        let path = archive_path(&job.archive_dir, self.output_log);
        match self.client.read_file(&path).await {
            Ok(bytes) => classify_failure(&String::from_utf8_lossy(&bytes), self.marker),
            Err(e) => {
                warn!("Could not read output log {} of job {}: {}", path, job.id, e);
                FailureClass::Permanent
            }
        }
    }

    /// Outcome of the completion check for a terminal job
    ///
    /// FINISHED passes, FAILED with a transient cause is skipped, every
    /// other terminal status fails.
    pub async fn check(&self, job: &Job) -> Outcome {
        match job.status {
            JobStatus::Finished => Outcome::Pass,
            JobStatus::Failed => match self.classify(job).await {
                FailureClass::Transient => {
                    info!(
                        "Job {} failed for lack of resources, marking inconclusive",
                        job.id
                    );
                    Outcome::skip(format!(
                        "job {} could not be provisioned ({})",
                        job.id, self.marker
                    ))
                }
                FailureClass::Permanent => Outcome::fail(format!("job {} FAILED", job.id)),
            },
            ref other => Outcome::fail(format!(
                "job {} ended in {}, expected FINISHED",
                job.id, other
            )),
        }
    }
}
