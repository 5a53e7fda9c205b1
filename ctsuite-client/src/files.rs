//! File-related API endpoints

use crate::TapisClient;
use crate::error::Result;
use ctsuite_core::dto::files::RemoteFile;

/// Upper bound on entries returned by one listing
const LIST_LIMIT: u32 = 1000;

impl TapisClient {
    // =============================================================================
    // Files
    // =============================================================================

    /// List the entries of a directory on the archive system
    ///
    /// # Arguments
    /// * `path` - Directory path, absolute or relative to the system root
    pub async fn list_files(&self, path: &str) -> Result<Vec<RemoteFile>> {
        let url = self.files_url("ops", path);
        let request = self.authorized(self.client.get(&url)).await?;
        let response = request
            .query(&[("limit", LIST_LIMIT.to_string())])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Read the raw contents of a file on the archive system
    ///
    /// # Arguments
    /// * `path` - File path, absolute or relative to the system root
    pub async fn get_contents(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.files_url("content", path);
        let request = self.authorized(self.client.get(&url)).await?;
        let response = request.send().await?;

        self.handle_bytes_response(response).await
    }

    fn files_url(&self, operation: &str, path: &str) -> String {
        format!(
            "{}/v3/files/{}/{}/{}",
            self.base_url,
            operation,
            self.system_id,
            path.trim_start_matches('/')
        )
    }
}
