//! Authentication endpoints

use crate::error::Result;
use crate::TapisClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Password grant request body
#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    username: &'a str,
    password: &'a str,
    grant_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenResult {
    access_token: AccessToken,
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
    #[serde(default)]
    expires_at: Option<String>,
}

impl TapisClient {
    // =============================================================================
    // Authentication
    // =============================================================================

    /// Obtain an access token with the password grant and keep it for
    /// subsequent requests
    ///
    /// # Arguments
    /// * `username` - Tenant user name
    /// * `password` - Tenant password
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<()> {
        let url = format!("{}/v3/oauth2/tokens", self.base_url);
        debug!("Requesting access token for {}", username);

        let response = self
            .client
            .post(&url)
            .json(&TokenRequest {
                username,
                password,
                grant_type: "password",
            })
            .send()
            .await?;

        let result: TokenResult = self.handle_response(response).await?;
        if let Some(expires_at) = &result.access_token.expires_at {
            info!("Authenticated as {} (token expires {})", username, expires_at);
        } else {
            info!("Authenticated as {}", username);
        }

        *self.token.write().await = Some(result.access_token.access_token);
        Ok(())
    }

    /// Whether an access token is currently held
    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }
}
