//! The capabilities the suite consumes from the platform

use async_trait::async_trait;
use ctsuite_core::domain::job::{Job, JobStatus};
use ctsuite_core::dto::files::RemoteFile;
use ctsuite_core::dto::submission::JobSubmission;

use crate::TapisClient;
use crate::error::Result;

/// Remote job platform as seen by the suite
///
/// Status and read operations are idempotent and safe to retry. `submit`
/// has a remote side effect; callers guard it with the experiment log.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Submits a job and returns its id
    async fn submit(&self, submission: &JobSubmission) -> Result<String>;

    /// Fetches the job record (status and archive directory)
    async fn get_job(&self, job_id: &str) -> Result<Job>;

    /// Fetches only the job status
    async fn status(&self, job_id: &str) -> Result<JobStatus> {
        Ok(self.get_job(job_id).await?.status)
    }

    /// Lists a remote directory
    async fn list_files(&self, path: &str) -> Result<Vec<RemoteFile>>;

    /// Reads a remote file
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl RemoteClient for TapisClient {
    async fn submit(&self, submission: &JobSubmission) -> Result<String> {
        self.submit_job(submission).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Job> {
        TapisClient::get_job(self, job_id).await
    }

    async fn list_files(&self, path: &str) -> Result<Vec<RemoteFile>> {
        TapisClient::list_files(self, path).await
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.get_contents(path).await
    }
}
