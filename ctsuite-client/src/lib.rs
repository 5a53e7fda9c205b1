//! ctsuite Platform Client
//!
//! A small, type-safe HTTP client for the Tapis v3 job-submission platform
//! the camera-traps suite runs against.
//!
//! The suite only needs four capabilities from the platform, captured by the
//! [`RemoteClient`] trait: submit a job, read a job, list files and read a
//! file. [`TapisClient`] implements them over HTTP; tests substitute an
//! in-memory implementation.
//!
//! # Example
//!
//! ```no_run
//! use ctsuite_client::TapisClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = TapisClient::new("https://icicleai.develop.tapis.io", "icicledev-test");
//!     client.authenticate("username", "password").await?;
//!
//!     let job = client.get_job("1c1e2a0e-007").await?;
//!     println!("job {} is {}", job.id, job.status);
//!     Ok(())
//! }
//! ```

mod auth;
pub mod error;
mod files;
mod jobs;
mod remote;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use remote::RemoteClient;

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

/// Header carrying the access token on every authenticated request
const TOKEN_HEADER: &str = "X-Tapis-Token";

/// HTTP client for the Tapis v3 API
///
/// Endpoints are organized into logical groups:
/// - Authentication (password grant token)
/// - Jobs (submit, get)
/// - Files (list, get contents) on a single archive system
#[derive(Debug)]
pub struct TapisClient {
    /// Base URL of the tenant (e.g., "https://icicleai.develop.tapis.io")
    base_url: String,
    /// System the job archives live on
    system_id: String,
    /// HTTP client instance
    client: Client,
    /// Access token obtained by `authenticate`
    token: RwLock<Option<String>>,
}

/// Standard response envelope: `{status, message, result}`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    message: Option<String>,
    result: T,
}

impl TapisClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The tenant base URL
    /// * `system_id` - The archive system used for file operations
    ///
    /// # Example
    /// ```
    /// use ctsuite_client::TapisClient;
    ///
    /// let client = TapisClient::new("https://icicleai.develop.tapis.io", "icicledev-test");
    /// ```
    pub fn new(base_url: impl Into<String>, system_id: impl Into<String>) -> Self {
        Self::with_client(base_url, system_id, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(
        base_url: impl Into<String>,
        system_id: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            system_id: system_id.into(),
            client,
            token: RwLock::new(None),
        }
    }

    /// Use an access token obtained elsewhere instead of calling `authenticate`
    pub fn with_token(self, token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
            ..self
        }
    }

    /// Get the base URL of the tenant
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the archive system id
    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    // =============================================================================
    // Request Helpers
    // =============================================================================

    /// Attach the access token to a request
    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token.read().await;
        match token.as_deref() {
            Some(token) => Ok(request.header(TOKEN_HEADER, token)),
            None => Err(ClientError::Unauthenticated),
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and unwrap the `result` field of the envelope
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        let body = response.bytes().await?;
        parse_envelope(&body)
    }

    /// Handle an API response whose body is raw file content
    async fn handle_bytes_response(&self, response: reqwest::Response) -> Result<Vec<u8>> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Parse a response envelope and return its `result`
fn parse_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_slice(body)
        .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))?;

    if let Some(message) = &envelope.message {
        tracing::trace!("Platform message: {}", message);
    }

    Ok(envelope.result)
}
