// Integration tests for POST /generate-token

mod common;

use axum::{body::Body, http::{Request, StatusCode}};
use common::*;
use jsonwebtoken::DecodingKey;
use phantom_gateway::config::SigningAlgorithm;
use phantom_gateway::token::{decode_token, TOKEN_LIFETIME_SECONDS};
use serde_json::json;

/// A valid request yields a three-segment JWT carrying the ids.
#[tokio::test]
async fn test_generate_token_success() {
    let app = TestAppBuilder::new().build();

    let (status, body) = send(
        &app.router,
        post_json("/generate-token", json!({"sessionId": "sess_abc", "userId": "student_001"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();
    assert_eq!(token.split('.').count(), 3);

    let claims = decode_token(
        token,
        &DecodingKey::from_secret(JWT_SECRET.as_bytes()),
        SigningAlgorithm::Hs256,
        AUDIENCE,
    )
    .unwrap();
    assert_eq!(claims.session_id, "sess_abc");
    assert_eq!(claims.user_id, "student_001");
    assert_eq!(claims.iss, CLIENT_EMAIL);
    assert_eq!(claims.exp - claims.iat, TOKEN_LIFETIME_SECONDS);
}

/// The legacy path is served by the same handler.
#[tokio::test]
async fn test_legacy_path() {
    let app = TestAppBuilder::new().build();

    let (status, body) = send(
        &app.router,
        post_json("/generate-gemini-token", json!({"sessionId": "s", "userId": "u"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
}

/// `{}` is rejected before the signing key is touched.
#[tokio::test]
async fn test_empty_body_rejected() {
    let app = TestAppBuilder::new().build();

    let (status, body) = send(&app.router, post_json("/generate-token", json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("required"));
    assert_eq!(app.secrets.calls(), 0);
}

#[tokio::test]
async fn test_missing_user_id_rejected() {
    let app = TestAppBuilder::new().build();

    let (status, body) = send(
        &app.router,
        post_json("/generate-token", json!({"sessionId": "sess_abc"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "sessionId and userId are required in the request body.");
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let app = TestAppBuilder::new().build();

    let request = Request::builder()
        .method("POST")
        .uri("/generate-token")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));
}

/// Secret store failure surfaces as a signing error without key material.
#[tokio::test]
async fn test_secret_failure_is_500() {
    let app = TestAppBuilder::new().secrets(FakeSecretStore::empty()).build();

    let (status, body) = send(
        &app.router,
        post_json("/generate-token", json!({"sessionId": "s", "userId": "u"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to generate token.");
    let details = body["details"].as_str().unwrap();
    assert!(details.contains(SIGNING_KEY_SECRET));
    assert!(!details.contains("PERMISSION_DENIED"));
}

/// Concurrent first requests share one secret fetch.
#[tokio::test]
async fn test_concurrent_requests_fetch_key_once() {
    let app = TestAppBuilder::new().build();

    let requests = (0..8).map(|i| {
        send(
            &app.router,
            post_json(
                "/generate-token",
                json!({"sessionId": format!("sess_{}", i), "userId": "student_001"}),
            ),
        )
    });
    let results = futures::future::join_all(requests).await;

    for (status, _) in results {
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(app.secrets.calls(), 1);
}
