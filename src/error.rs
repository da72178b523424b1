//! Gateway error taxonomy and its single HTTP translation.
//!
//! Components return [`GatewayError`]; the `IntoResponse` impl below is the only
//! place that decides status codes. Payloads carry safe, top-level messages
//! only. Provider bodies and secret values are logged where they occur and never
//! stored here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::error;

/// Errors surfaced by the credential and token gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// Missing or malformed caller input
    Validation(String),
    /// No user record for the given id
    UserNotFound(String),
    /// User exists but has no stored refresh token
    AccountNotLinked(String),
    /// Secret could not be fetched or decoded (holds the secret name)
    SecretUnavailable(String),
    /// OAuth client could not be constructed
    OAuthConfig(String),
    /// Ephemeral token could not be signed
    Signing(String),
    /// Authorization code exchange failed
    OAuthExchange(String),
    /// Downstream API call failed
    DownstreamApi(String),
    /// External call exceeded its time budget (holds the operation name)
    DownstreamTimeout(String),
    /// Local failure (storage, lock poisoning)
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::UserNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::AccountNotLinked(_) => StatusCode::FORBIDDEN,
            GatewayError::DownstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::SecretUnavailable(_)
            | GatewayError::OAuthConfig(_)
            | GatewayError::Signing(_)
            | GatewayError::OAuthExchange(_)
            | GatewayError::DownstreamApi(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Generic message returned in the `error` field.
    fn public_message(&self) -> String {
        match self {
            GatewayError::Validation(msg) => msg.clone(),
            GatewayError::UserNotFound(_) => "User not found".to_string(),
            GatewayError::AccountNotLinked(_) => {
                "User has not connected their Google account".to_string()
            }
            GatewayError::SecretUnavailable(_) => "Failed to access secret.".to_string(),
            GatewayError::OAuthConfig(_) => "OAuth client is not configured.".to_string(),
            GatewayError::Signing(_) => "Failed to generate token.".to_string(),
            GatewayError::OAuthExchange(_) => "Failed to process OAuth callback.".to_string(),
            GatewayError::DownstreamApi(_) => "Failed to list courses.".to_string(),
            GatewayError::DownstreamTimeout(_) => "Downstream service timed out.".to_string(),
            GatewayError::Internal(_) => "Internal server error.".to_string(),
        }
    }

    /// Safe top-level detail; `None` for client errors whose message is enough.
    fn details(&self) -> Option<String> {
        match self {
            GatewayError::Validation(_)
            | GatewayError::UserNotFound(_)
            | GatewayError::AccountNotLinked(_) => None,
            GatewayError::Internal(_) => None,
            other => Some(other.to_string()),
        }
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Validation(msg) => write!(f, "Invalid request: {}", msg),
            GatewayError::UserNotFound(id) => write!(f, "User '{}' not found", id),
            GatewayError::AccountNotLinked(id) => {
                write!(f, "User '{}' has not linked a Google account", id)
            }
            GatewayError::SecretUnavailable(name) => {
                write!(f, "Failed to access secret: {}. Check logs for details.", name)
            }
            GatewayError::OAuthConfig(msg) => write!(f, "OAuth configuration error: {}", msg),
            GatewayError::Signing(msg) => write!(f, "Token signing failed: {}", msg),
            GatewayError::OAuthExchange(msg) => write!(f, "OAuth code exchange failed: {}", msg),
            GatewayError::DownstreamApi(msg) => write!(f, "Downstream API error: {}", msg),
            GatewayError::DownstreamTimeout(op) => write!(f, "Timed out waiting for {}", op),
            GatewayError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

/// JSON error body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.public_message(),
            details: self.details(),
        });

        (self.status_code(), body).into_response()
    }
}

/// Bounds an external call by `limit`, mapping expiry to `DownstreamTimeout`.
pub(crate) async fn with_timeout<T, F>(
    limit: Duration,
    operation: &str,
    fut: F,
) -> Result<T, GatewayError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        error!(
            operation = %operation,
            timeout_ms = limit.as_millis() as u64,
            "External call timed out"
        );
        GatewayError::DownstreamTimeout(operation.to_string())
    })
}
