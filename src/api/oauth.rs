use super::{GatewayState, MessageResponse};
use crate::error::GatewayError;
use crate::oauth::{Course, LinkOutcome};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// OAuth callback body posted by the UI
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct OAuthCallbackRequest {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

/// `?userId=`
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Serialize)]
pub struct AuthorizeUrlResponse {
    url: String,
}

/// POST /oauth-callback
pub async fn oauth_callback(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<OAuthCallbackRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, GatewayError> {
    let Json(request) = body?;
    let code = request.code.unwrap_or_default();
    let user_id = request.user_id.unwrap_or_default();

    let message = match state.oauth.exchange_code_for_tokens(&code, &user_id).await? {
        LinkOutcome::Linked => "Successfully connected Google account.",
        LinkOutcome::Reauthorized => "Successfully connected Google account (existing link kept).",
    };
    Ok(MessageResponse::new(message))
}

/// GET /oauth/authorize-url?userId=
pub async fn authorize_url(
    State(state): State<Arc<GatewayState>>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<AuthorizeUrlResponse>, GatewayError> {
    let Query(query) = query?;
    let url = state
        .oauth
        .authorization_url(query.user_id.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(AuthorizeUrlResponse { url }))
}

/// GET /external-courses?userId=
pub async fn external_courses(
    State(state): State<Arc<GatewayState>>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<Vec<Course>>, GatewayError> {
    let Query(query) = query?;
    let courses = state
        .oauth
        .list_downstream_resources(query.user_id.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(courses))
}
