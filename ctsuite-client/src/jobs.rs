//! Job-related API endpoints

use crate::TapisClient;
use crate::error::Result;
use ctsuite_core::domain::job::Job;
use ctsuite_core::dto::submission::JobSubmission;
use serde::Deserialize;

/// Result of a submission: the platform returns the full job, of which the
/// suite only needs the token
#[derive(Debug, Deserialize)]
struct SubmittedJob {
    uuid: String,
}

impl TapisClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Submit a new job
    ///
    /// # Arguments
    /// * `submission` - The job submission descriptor
    ///
    /// # Returns
    /// The opaque job id issued by the platform
    pub async fn submit_job(&self, submission: &JobSubmission) -> Result<String> {
        let url = format!("{}/v3/jobs/submit", self.base_url);
        let request = self.authorized(self.client.post(&url)).await?;
        let response = request.json(submission).send().await?;

        let submitted: SubmittedJob = self.handle_response(response).await?;
        Ok(submitted.uuid)
    }

    /// Get a job by id
    ///
    /// # Arguments
    /// * `job_id` - The job token
    ///
    /// # Returns
    /// The job's current status and archive location
    pub async fn get_job(&self, job_id: &str) -> Result<Job> {
        let url = format!("{}/v3/jobs/{}", self.base_url, job_id);
        let request = self.authorized(self.client.get(&url)).await?;
        let response = request.send().await?;

        self.handle_response(response).await
    }
}
