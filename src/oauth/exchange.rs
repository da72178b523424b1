//! OAuth token endpoint calls.
//!
//! Two grants are used: `authorization_code` when a user links their account,
//! and `refresh_token` whenever we act on their behalf afterwards.

use super::client::ClientCredentials;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Tokens returned by the provider.
#[derive(Clone, PartialEq)]
pub struct TokenSet {
    pub access_token: String,
    /// Only present on first consent (or with `prompt=consent`)
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// OAuth 2.0 token endpoint.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange an authorization code (`grant_type=authorization_code`).
    async fn exchange_code(
        &self,
        client: &ClientCredentials,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet>;

    /// Obtain a fresh access token (`grant_type=refresh_token`).
    async fn refresh_access_token(
        &self,
        client: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<TokenSet>;
}

/// Standard OAuth 2.0 token response
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

/// RFC 6749 §5.2 error response
#[derive(Deserialize, Debug)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Token endpoint reached over HTTPS.
pub struct HttpTokenEndpoint {
    http: reqwest::Client,
    token_url: String,
}

impl HttpTokenEndpoint {
    pub fn new(http: reqwest::Client, token_url: &str) -> Self {
        Self {
            http,
            token_url: token_url.to_string(),
        }
    }

    async fn request(&self, form: &[(&str, &str)], grant: &str) -> Result<TokenSet> {
        tracing::debug!(grant = %grant, token_url = %self.token_url, "Calling OAuth token endpoint");

        let response = self
            .http
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .context("Failed to send token request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // Keep only the RFC 6749 error code and description
            return Err(match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => anyhow!(
                    "Token endpoint rejected {} grant: {}{}",
                    grant,
                    err.error,
                    err.error_description
                        .map(|d| format!(" ({})", d))
                        .unwrap_or_default()
                ),
                Err(_) => anyhow!("Token endpoint returned status {} for {} grant", status, grant),
            });
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        tracing::debug!(
            grant = %grant,
            has_refresh_token = token_response.refresh_token.is_some(),
            expires_in = ?token_response.expires_in,
            "Token request successful"
        );

        Ok(token_response.into())
    }
}

impl From<TokenResponse> for TokenSet {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
            // Out-of-range lifetimes are dropped rather than overflowing
            expires_at: response.expires_in.and_then(|seconds| {
                Duration::try_seconds(seconds).and_then(|d| Utc::now().checked_add_signed(d))
            }),
            scope: response.scope,
        }
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn exchange_code(
        &self,
        client: &ClientCredentials,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet> {
        self.request(
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
            ],
            "authorization_code",
        )
        .await
    }

    async fn refresh_access_token(
        &self,
        client: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<TokenSet> {
        self.request(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
            ],
            "refresh_token",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn credentials() -> ClientCredentials {
        ClientCredentials {
            client_id: "client-123".to_string(),
            client_secret: "shh".to_string(),
        }
    }

    #[test]
    fn test_token_response_deserialization() {
        let json = r#"{
            "access_token": "ya29.a0Af",
            "refresh_token": "1//0gRefresh",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/classroom.courses.readonly",
            "token_type": "Bearer"
        }"#;

        let tokens: TokenSet = serde_json::from_str::<TokenResponse>(json).unwrap().into();
        assert_eq!(tokens.access_token, "ya29.a0Af");
        assert_eq!(tokens.refresh_token.as_deref(), Some("1//0gRefresh"));
        assert!(tokens.expires_at.unwrap() > Utc::now());
    }

    #[test]
    fn test_token_response_minimal() {
        let tokens: TokenSet = serde_json::from_str::<TokenResponse>(r#"{"access_token":"a"}"#)
            .unwrap()
            .into();
        assert_eq!(tokens.refresh_token, None);
        assert_eq!(tokens.expires_at, None);
    }

    #[test]
    fn test_empty_refresh_token_treated_as_absent() {
        let tokens: TokenSet =
            serde_json::from_str::<TokenResponse>(r#"{"access_token":"a","refresh_token":""}"#)
                .unwrap()
                .into();
        assert_eq!(tokens.refresh_token, None);
    }

    #[tokio::test]
    async fn test_huge_expires_in_does_not_overflow() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token":"a","refresh_token":"rt","expires_in":9223372036854775807}"#,
            )
            .create_async()
            .await;

        let endpoint = HttpTokenEndpoint::new(reqwest::Client::new(), &format!("{}/token", server.url()));
        let tokens = endpoint
            .exchange_code(&credentials(), "4/0Auth", "http://localhost:3000/oauth-callback")
            .await
            .unwrap();

        assert_eq!(tokens.refresh_token.as_deref(), Some("rt"));
        assert_eq!(tokens.expires_at, None);
    }

    #[test]
    fn test_negative_expires_in_within_range() {
        let tokens: TokenSet =
            serde_json::from_str::<TokenResponse>(r#"{"access_token":"a","expires_in":-60}"#)
                .unwrap()
                .into();
        assert!(tokens.expires_at.unwrap() < Utc::now());
    }

    #[tokio::test]
    async fn test_exchange_code_posts_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "4/0Auth".into()),
                Matcher::UrlEncoded("redirect_uri".into(), "http://localhost:3000/oauth-callback".into()),
                Matcher::UrlEncoded("client_id".into(), "client-123".into()),
                Matcher::UrlEncoded("client_secret".into(), "shh".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29","refresh_token":"1//rt","expires_in":3599}"#)
            .create_async()
            .await;

        let endpoint = HttpTokenEndpoint::new(reqwest::Client::new(), &format!("{}/token", server.url()));
        let tokens = endpoint
            .exchange_code(&credentials(), "4/0Auth", "http://localhost:3000/oauth-callback")
            .await
            .unwrap();

        assert_eq!(tokens.refresh_token.as_deref(), Some("1//rt"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_access_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "1//rt".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"ya29.fresh","expires_in":3599}"#)
            .create_async()
            .await;

        let endpoint = HttpTokenEndpoint::new(reqwest::Client::new(), &format!("{}/token", server.url()));
        let tokens = endpoint
            .refresh_access_token(&credentials(), "1//rt")
            .await
            .unwrap();

        assert_eq!(tokens.access_token, "ya29.fresh");
        assert_eq!(tokens.refresh_token, None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_grant_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Bad Request"}"#)
            .create_async()
            .await;

        let endpoint = HttpTokenEndpoint::new(reqwest::Client::new(), &format!("{}/token", server.url()));
        let err = endpoint
            .exchange_code(&credentials(), "used-code", "http://localhost:3000/oauth-callback")
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Token endpoint rejected authorization_code grant: invalid_grant (Bad Request)"
        );
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(502)
            .with_body("<html>upstream exploded</html>")
            .create_async()
            .await;

        let endpoint = HttpTokenEndpoint::new(reqwest::Client::new(), &format!("{}/token", server.url()));
        let err = endpoint
            .refresh_access_token(&credentials(), "1//rt")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("502"));
        assert!(!err.to_string().contains("exploded"));
    }
}
