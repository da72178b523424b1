//! HTTP surface of the gateway.
//!
//! Handlers validate nothing themselves beyond extraction; the components own
//! validation and every failure flows through [`GatewayError`]'s
//! `IntoResponse`.

mod oauth;
mod profile;
mod tokens;

use crate::error::GatewayError;
use crate::oauth::OAuthSessionManager;
use crate::token::TokenMinter;
use crate::users::UserStore;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Process-scoped components shared by all handlers
#[derive(Clone)]
pub struct GatewayState {
    pub oauth: Arc<OAuthSessionManager>,
    pub minter: Arc<TokenMinter>,
    pub users: Arc<UserStore>,
}

/// `{message}` acknowledgement
#[derive(Serialize)]
pub(crate) struct MessageResponse {
    message: String,
}

impl MessageResponse {
    pub(crate) fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

/// Create the gateway router.
///
/// Legacy paths (`/generate-gemini-token`, `/google-oauth-callback`,
/// `/classroom/courses`) are served by the same handlers.
pub fn create_router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/generate-token", post(tokens::generate_token))
        .route("/generate-gemini-token", post(tokens::generate_token))
        .route("/oauth-callback", post(oauth::oauth_callback))
        .route("/google-oauth-callback", post(oauth::oauth_callback))
        .route("/oauth/authorize-url", get(oauth::authorize_url))
        .route("/external-courses", get(oauth::external_courses))
        .route("/classroom/courses", get(oauth::external_courses))
        .route(
            "/profile/:id",
            get(profile::get_profile).put(profile::update_profile),
        )
        .with_state(Arc::new(state))
}

/// GET /
async fn health() -> Json<MessageResponse> {
    MessageResponse::new("Credential gateway is up and running.")
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        GatewayError::Validation(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for GatewayError {
    fn from(rejection: QueryRejection) -> Self {
        GatewayError::Validation(format!("Invalid query string: {}", rejection.body_text()))
    }
}
