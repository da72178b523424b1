use super::GatewayState;
use crate::error::GatewayError;
use crate::users::{ProfileUpdate, UserProfile};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
};
use std::sync::Arc;
use tracing::{error, info};

/// GET /profile/:id
pub async fn get_profile(
    State(state): State<Arc<GatewayState>>,
    Path(user_id): Path<String>,
) -> Result<Json<UserProfile>, GatewayError> {
    let user = state
        .users
        .get(&user_id)
        .map_err(|e| storage_error(&user_id, e))?
        .ok_or_else(|| GatewayError::UserNotFound(user_id.clone()))?;

    Ok(Json(UserProfile::from(&user)))
}

/// PUT /profile/:id
///
/// Creates the user if needed. Fields left out of the body keep their value.
pub async fn update_profile(
    State(state): State<Arc<GatewayState>>,
    Path(user_id): Path<String>,
    body: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<UserProfile>, GatewayError> {
    let Json(update) = body?;

    if user_id.trim().is_empty() {
        return Err(GatewayError::Validation("User id is required.".to_string()));
    }
    if update.is_empty() {
        return Err(GatewayError::Validation(
            "At least one of email or displayName is required.".to_string(),
        ));
    }
    if let Some(email) = update.email.as_deref() {
        if !email.contains('@') {
            return Err(GatewayError::Validation("email is not valid.".to_string()));
        }
    }

    let user = state
        .users
        .upsert_profile(&user_id, &update)
        .map_err(|e| storage_error(&user_id, e))?;

    info!(user_id = %user_id, "Profile updated");
    Ok(Json(UserProfile::from(&user)))
}

fn storage_error(user_id: &str, err: anyhow::Error) -> GatewayError {
    error!(user_id = %user_id, error = %format!("{:#}", err), "User store failure");
    GatewayError::Internal("user store failure".to_string())
}
