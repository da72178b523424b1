use super::GatewayState;
use crate::error::GatewayError;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTokenRequest {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Serialize)]
pub struct GenerateTokenResponse {
    token: String,
}

/// POST /generate-token
///
/// Returns `{token}`: a one-hour JWT bound to the session and user.
pub async fn generate_token(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<GenerateTokenRequest>, JsonRejection>,
) -> Result<Json<GenerateTokenResponse>, GatewayError> {
    let Json(request) = body?;
    let session_id = request.session_id.unwrap_or_default();
    let user_id = request.user_id.unwrap_or_default();

    let token = state.minter.mint_token(&session_id, &user_id).await?;

    info!(session_id = %session_id, user_id = %user_id, "Ephemeral token issued");
    Ok(Json(GenerateTokenResponse { token }))
}
