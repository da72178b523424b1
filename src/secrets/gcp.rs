//! Google Secret Manager backend.
//!
//! Calls `versions/latest:access` over REST. The bearer token is either a
//! configured static token or one obtained from the GCE metadata server.

use super::SecretStore;
use crate::config::SecretsConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;

/// `AccessSecretVersionResponse`
#[derive(Deserialize, Debug)]
struct AccessResponse {
    payload: Option<SecretPayload>,
}

#[derive(Deserialize, Debug)]
struct SecretPayload {
    #[serde(default)]
    data: Option<String>,
}

/// Metadata server token response
#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

enum Credentials {
    Static(String),
    Metadata { token_url: String },
}

/// Secret Manager client bound to one project.
pub struct GcpSecretManager {
    http: reqwest::Client,
    project_id: String,
    api_base_url: String,
    credentials: Credentials,
}

impl GcpSecretManager {
    pub fn from_config(http: reqwest::Client, config: &SecretsConfig) -> Self {
        let credentials = match &config.access_token {
            Some(token) => Credentials::Static(token.clone()),
            None => Credentials::Metadata {
                token_url: config.metadata_token_url.clone(),
            },
        };

        Self {
            http,
            project_id: config.project_id.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn version_url(&self, name: &str) -> String {
        format!(
            "{}/v1/projects/{}/secrets/{}/versions/latest:access",
            self.api_base_url,
            urlencoding::encode(&self.project_id),
            urlencoding::encode(name)
        )
    }

    async fn bearer_token(&self) -> Result<String> {
        match &self.credentials {
            Credentials::Static(token) => Ok(token.clone()),
            Credentials::Metadata { token_url } => {
                let response = self
                    .http
                    .get(token_url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .context("Failed to reach metadata server")?;

                if !response.status().is_success() {
                    return Err(anyhow!(
                        "Metadata server returned status {}",
                        response.status()
                    ));
                }

                let token: MetadataToken = response
                    .json()
                    .await
                    .context("Failed to parse metadata token response")?;
                Ok(token.access_token)
            }
        }
    }
}

#[async_trait]
impl SecretStore for GcpSecretManager {
    async fn access_latest(&self, name: &str) -> Result<Vec<u8>> {
        let token = self.bearer_token().await?;

        let response = self
            .http
            .get(self.version_url(name))
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send secret access request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(secret = %name, status = %status, body = %body, "Secret Manager error body");
            return Err(anyhow!("Secret Manager returned status {}", status));
        }

        let access: AccessResponse = response
            .json()
            .await
            .context("Failed to parse secret access response")?;

        let data = access
            .payload
            .and_then(|p| p.data)
            .ok_or_else(|| anyhow!("Secret version has no payload data"))?;

        BASE64
            .decode(data.as_bytes())
            .context("Secret payload is not valid base64")
    }

    fn backend_name(&self) -> &'static str {
        "gcp-secret-manager"
    }
}
