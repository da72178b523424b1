//! Ephemeral token minting for the streaming API.
//!
//! The browser never sees the service-account key. It asks for a token bound
//! to a session and user, valid for one hour, and presents that to the
//! streaming endpoint instead.


use crate::config::{GatewayConfig, SigningAlgorithm};
use crate::error::GatewayError;
use crate::secrets::SecretCache;
use anyhow::Context;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Lifetime of every minted token
pub const TOKEN_LIFETIME_SECONDS: i64 = 3600;

/// Claims carried by an ephemeral token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemeralClaims {
    /// Issuer (service account email)
    pub iss: String,
    /// Subject (service account email)
    pub sub: String,
    /// Audience (streaming API base URL)
    pub aud: String,
    /// Issued-at unix seconds
    pub iat: i64,
    /// Expiration unix seconds
    pub exp: i64,
    pub session_id: String,
    pub user_id: String,
}

/// Service account key material stored as a JSON secret.
#[derive(Deserialize, Clone)]
pub struct ServiceAccountKey {
    pub client_email: String,
    /// PEM-encoded RSA key (RS256)
    #[serde(default)]
    pub private_key: Option<String>,
    /// Shared HMAC secret (HS256)
    #[serde(default)]
    pub jwt_secret: Option<String>,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("has_private_key", &self.private_key.is_some())
            .field("has_jwt_secret", &self.jwt_secret.is_some())
            .finish()
    }
}

impl ServiceAccountKey {
    fn encoding_key(&self, algorithm: SigningAlgorithm) -> anyhow::Result<EncodingKey> {
        match algorithm {
            SigningAlgorithm::Hs256 => {
                let secret = self
                    .jwt_secret
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .context("Service account key has no jwt_secret for HS256")?;
                Ok(EncodingKey::from_secret(secret.as_bytes()))
            }
            SigningAlgorithm::Rs256 => {
                let pem = self
                    .private_key
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .context("Service account key has no private_key for RS256")?;
                EncodingKey::from_rsa_pem(pem.as_bytes()).context("Invalid RSA private key")
            }
        }
    }
}

impl From<SigningAlgorithm> for Algorithm {
    fn from(algorithm: SigningAlgorithm) -> Self {
        match algorithm {
            SigningAlgorithm::Hs256 => Algorithm::HS256,
            SigningAlgorithm::Rs256 => Algorithm::RS256,
        }
    }
}

/// Mints short-lived JWTs signed with the service-account key.
pub struct TokenMinter {
    secrets: Arc<SecretCache>,
    key_secret_name: String,
    audience: String,
    algorithm: SigningAlgorithm,
}

impl TokenMinter {
    pub fn new(
        secrets: Arc<SecretCache>,
        key_secret_name: &str,
        audience: &str,
        algorithm: SigningAlgorithm,
    ) -> Self {
        Self {
            secrets,
            key_secret_name: key_secret_name.to_string(),
            audience: audience.to_string(),
            algorithm,
        }
    }

    pub fn from_config(secrets: Arc<SecretCache>, config: &GatewayConfig) -> Self {
        Self::new(
            secrets,
            &config.secrets.signing_key_secret,
            &config.token.audience,
            config.token.algorithm,
        )
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Mint a token for `session_id` / `user_id`.
    ///
    /// # Errors
    /// - `Validation` if either id is empty (no secret is fetched)
    /// - `Signing` if the key cannot be loaded or used
    /// - `DownstreamTimeout` if the secret store does not answer
    pub async fn mint_token(&self, session_id: &str, user_id: &str) -> Result<String, GatewayError> {
        if session_id.trim().is_empty() || user_id.trim().is_empty() {
            return Err(GatewayError::Validation(
                "sessionId and userId are required in the request body.".to_string(),
            ));
        }

        let key: ServiceAccountKey = self
            .secrets
            .get_json(&self.key_secret_name)
            .await
            .map_err(|e| match e {
                GatewayError::DownstreamTimeout(_) => e,
                other => {
                    error!(
                        operation = "mint_token",
                        secret = %self.key_secret_name,
                        error = %other,
                        "Signing key unavailable"
                    );
                    GatewayError::Signing(format!(
                        "signing key '{}' unavailable",
                        self.key_secret_name
                    ))
                }
            })?;

        let iat = Utc::now().timestamp();
        let claims = EphemeralClaims {
            iss: key.client_email.clone(),
            sub: key.client_email.clone(),
            aud: self.audience.clone(),
            iat,
            exp: iat + TOKEN_LIFETIME_SECONDS,
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
        };

        let token = key
            .encoding_key(self.algorithm)
            .and_then(|encoding_key| {
                jsonwebtoken::encode(&Header::new(self.algorithm.into()), &claims, &encoding_key)
                    .context("Failed to encode JWT")
            })
            .map_err(|e| {
                error!(
                    operation = "mint_token",
                    user_id = %user_id,
                    error = %format!("{:#}", e),
                    "Token signing failed"
                );
                GatewayError::Signing(e.to_string())
            })?;

        debug!(session_id = %session_id, user_id = %user_id, exp = claims.exp, "Ephemeral token minted");
        Ok(token)
    }
}

/// Verify a minted token's signature, expiry and audience.
pub fn decode_token(
    token: &str,
    key: &DecodingKey,
    algorithm: SigningAlgorithm,
    audience: &str,
) -> anyhow::Result<EphemeralClaims> {
    let mut validation = Validation::new(algorithm.into());
    validation.set_audience(&[audience]);
    validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);

    let data = jsonwebtoken::decode::<EphemeralClaims>(token, key, &validation)
        .context("Invalid ephemeral token")?;
    Ok(data.claims)
}
