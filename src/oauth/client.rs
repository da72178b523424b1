use super::exchange::{TokenEndpoint, TokenSet};
use anyhow::Result;
use std::sync::Arc;

/// OAuth client id/secret pair loaded from the secret store.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Google OAuth client: credentials + fixed redirect URI + token endpoint.
///
/// Built once per process by
/// [`OAuthSessionManager::get_oauth_client`](super::OAuthSessionManager::get_oauth_client).
/// It holds no per-user state; the refresh token is passed to
/// [`OAuthClient::authorize`] on each call instead of being set on the client.
pub struct OAuthClient {
    credentials: ClientCredentials,
    redirect_uri: String,
    endpoint: Arc<dyn TokenEndpoint>,
}

impl OAuthClient {
    pub fn new(
        credentials: ClientCredentials,
        redirect_uri: &str,
        endpoint: Arc<dyn TokenEndpoint>,
    ) -> Self {
        Self {
            credentials,
            redirect_uri: redirect_uri.to_string(),
            endpoint,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.credentials.client_id
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        self.endpoint
            .exchange_code(&self.credentials, code, &self.redirect_uri)
            .await
    }

    /// Trade a stored refresh token for a short-lived access token.
    pub async fn authorize(&self, refresh_token: &str) -> Result<TokenSet> {
        self.endpoint
            .refresh_access_token(&self.credentials, refresh_token)
            .await
    }
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("credentials", &self.credentials)
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let creds = ClientCredentials {
            client_id: "1234.apps.googleusercontent.com".to_string(),
            client_secret: "GOCSPX-very-secret".to_string(),
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("1234.apps.googleusercontent.com"));
        assert!(!debug.contains("very-secret"));
    }
}
