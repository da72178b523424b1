//! Google OAuth session management for Classroom access.
//!
//! Flow:
//! 1. UI asks for a consent URL (`authorization_url`) and sends the user there
//! 2. Google redirects back to the UI with `?code=...`
//! 3. UI posts `{code, userId}`; `exchange_code_for_tokens` trades the code and
//!    stores the refresh token on the user record (Unlinked → Linked)
//! 4. `list_downstream_resources` turns the stored refresh token into an access
//!    token and lists the user's Classroom courses
//!
//! The OAuth client is built once from the client id/secret secrets and shared
//! by every request afterwards.

mod classroom;
mod client;
mod exchange;
mod provider;


pub use classroom::{ClassroomClient, Course, CourseDirectory};
pub use client::{ClientCredentials, OAuthClient};
pub use exchange::{HttpTokenEndpoint, TokenEndpoint, TokenSet};
pub use provider::build_auth_url;

use crate::config::GatewayConfig;
use crate::error::{with_timeout, GatewayError};
use crate::secrets::SecretCache;
use crate::users::UserStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Names and endpoints the session manager needs.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id_secret: String,
    pub client_secret_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub scopes: Vec<String>,
}

impl OAuthSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            client_id_secret: config.secrets.oauth_client_id_secret.clone(),
            client_secret_secret: config.secrets.oauth_client_secret_secret.clone(),
            redirect_uri: config.oauth.redirect_uri.clone(),
            auth_url: config.oauth.auth_url.clone(),
            scopes: config.oauth.scopes.clone(),
        }
    }
}

/// Result of a successful code exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A refresh token was issued and stored
    Linked,
    /// No refresh token was issued; stored state unchanged
    Reauthorized,
}

/// Owns the OAuth client singleton and the per-user link state transitions.
pub struct OAuthSessionManager {
    secrets: Arc<SecretCache>,
    users: Arc<UserStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    courses: Arc<dyn CourseDirectory>,
    settings: OAuthSettings,
    client: OnceCell<Arc<OAuthClient>>,
    call_timeout: Duration,
}

impl OAuthSessionManager {
    pub fn new(
        secrets: Arc<SecretCache>,
        users: Arc<UserStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        courses: Arc<dyn CourseDirectory>,
        settings: OAuthSettings,
        call_timeout: Duration,
    ) -> Self {
        Self {
            secrets,
            users,
            endpoint,
            courses,
            settings,
            client: OnceCell::new(),
            call_timeout,
        }
    }

    /// Returns the process-wide OAuth client, building it on first use.
    ///
    /// # Errors
    /// - `OAuthConfig` if the client id or secret cannot be obtained
    /// - `DownstreamTimeout` if the secret store does not answer
    pub async fn get_oauth_client(&self) -> Result<Arc<OAuthClient>, GatewayError> {
        let client = self.client.get_or_try_init(|| self.build_client()).await?;
        Ok(client.clone())
    }

    async fn build_client(&self) -> Result<Arc<OAuthClient>, GatewayError> {
        let client_id = self
            .secrets
            .get_secret(&self.settings.client_id_secret)
            .await
            .map_err(config_error)?;
        let client_secret = self
            .secrets
            .get_secret(&self.settings.client_secret_secret)
            .await
            .map_err(config_error)?;

        let credentials = ClientCredentials {
            client_id: client_id.trim().to_string(),
            client_secret: client_secret.trim().to_string(),
        };

        info!(
            client_id = %credentials.client_id,
            redirect_uri = %self.settings.redirect_uri,
            "OAuth client constructed"
        );

        Ok(Arc::new(OAuthClient::new(
            credentials,
            &self.settings.redirect_uri,
            self.endpoint.clone(),
        )))
    }

    /// Consent URL for linking `user_id`'s Google account.
    pub async fn authorization_url(&self, user_id: &str) -> Result<String, GatewayError> {
        if user_id.trim().is_empty() {
            return Err(GatewayError::Validation(
                "userId query parameter is required.".to_string(),
            ));
        }

        let client = self.get_oauth_client().await?;
        Ok(build_auth_url(
            &self.settings.auth_url,
            client.client_id(),
            client.redirect_uri(),
            &self.settings.scopes,
            user_id,
        ))
    }

    /// Exchange an authorization code and record the refresh token, if any.
    ///
    /// A response without a refresh token is a successful re-authorization;
    /// the stored token (if any) is left untouched.
    ///
    /// # Errors
    /// - `Validation` if `code` or `user_id` is empty (checked before any I/O)
    /// - `OAuthConfig` if the client cannot be built
    /// - `OAuthExchange` if the provider rejects the code
    pub async fn exchange_code_for_tokens(
        &self,
        code: &str,
        user_id: &str,
    ) -> Result<LinkOutcome, GatewayError> {
        if code.trim().is_empty() || user_id.trim().is_empty() {
            return Err(GatewayError::Validation(
                "Authorization code and userId are required.".to_string(),
            ));
        }

        let client = self.get_oauth_client().await?;

        debug!(user_id = %user_id, "Exchanging authorization code");
        let tokens = with_timeout(
            self.call_timeout,
            "OAuth token endpoint",
            client.exchange_code(code),
        )
        .await?
        .map_err(|e| {
            error!(
                operation = "exchange_code_for_tokens",
                user_id = %user_id,
                error = %format!("{:#}", e),
                "Token exchange failed"
            );
            GatewayError::OAuthExchange(e.to_string())
        })?;

        debug!(
            user_id = %user_id,
            scope = ?tokens.scope,
            expires_at = ?tokens.expires_at,
            "Authorization code exchanged"
        );

        let Some(refresh_token) = tokens.refresh_token else {
            info!(user_id = %user_id, "Code exchanged without refresh token; link unchanged");
            return Ok(LinkOutcome::Reauthorized);
        };

        self.users
            .set_refresh_token(user_id, &refresh_token)
            .map_err(|e| {
                error!(
                    operation = "exchange_code_for_tokens",
                    user_id = %user_id,
                    error = %format!("{:#}", e),
                    "Failed to store refresh token"
                );
                GatewayError::Internal("failed to store refresh token".to_string())
            })?;

        info!(user_id = %user_id, "Google account linked");
        Ok(LinkOutcome::Linked)
    }

    /// List the user's Classroom courses.
    ///
    /// # Errors
    /// - `Validation` if `user_id` is empty
    /// - `UserNotFound` / `AccountNotLinked` from the user record
    /// - `DownstreamApi` if the token refresh or listing fails
    pub async fn list_downstream_resources(
        &self,
        user_id: &str,
    ) -> Result<Vec<Course>, GatewayError> {
        if user_id.trim().is_empty() {
            return Err(GatewayError::Validation(
                "userId query parameter is required.".to_string(),
            ));
        }

        let user = self
            .users
            .get(user_id)
            .map_err(|e| {
                error!(user_id = %user_id, error = %format!("{:#}", e), "Failed to load user");
                GatewayError::Internal("failed to load user".to_string())
            })?
            .ok_or_else(|| GatewayError::UserNotFound(user_id.to_string()))?;

        let Some(refresh_token) = user.google_refresh_token else {
            warn!(user_id = %user_id, "Course listing requested for unlinked account");
            return Err(GatewayError::AccountNotLinked(user_id.to_string()));
        };

        let client = self.get_oauth_client().await?;

        let access = with_timeout(
            self.call_timeout,
            "OAuth token endpoint",
            client.authorize(&refresh_token),
        )
        .await?
        .map_err(|e| downstream_error(user_id, "refresh_access_token", e))?;

        debug!(user_id = %user_id, expires_at = ?access.expires_at, "Access token refreshed");

        let courses = with_timeout(
            self.call_timeout,
            "Classroom API",
            self.courses.list_courses(&access.access_token),
        )
        .await?
        .map_err(|e| downstream_error(user_id, "list_courses", e))?;

        debug!(user_id = %user_id, count = courses.len(), "Listed downstream courses");
        Ok(courses)
    }
}

/// Secret failures while building the client surface as `OAuthConfig`.
fn config_error(err: GatewayError) -> GatewayError {
    match err {
        GatewayError::DownstreamTimeout(_) => err,
        GatewayError::SecretUnavailable(name) => {
            GatewayError::OAuthConfig(format!("Failed to access secret: {}", name))
        }
        other => GatewayError::OAuthConfig(other.to_string()),
    }
}

fn downstream_error(user_id: &str, operation: &str, err: anyhow::Error) -> GatewayError {
    error!(
        operation = %operation,
        user_id = %user_id,
        error = %format!("{:#}", err),
        "Downstream call failed"
    );
    GatewayError::DownstreamApi(err.to_string())
}
