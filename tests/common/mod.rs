// Shared fakes and app construction for HTTP integration tests

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use phantom_gateway::api::{create_router, GatewayState};
use phantom_gateway::config::SigningAlgorithm;
use phantom_gateway::oauth::{
    ClientCredentials, Course, CourseDirectory, OAuthSessionManager, OAuthSettings, TokenEndpoint,
    TokenSet,
};
use phantom_gateway::secrets::{SecretCache, SecretStore};
use phantom_gateway::token::TokenMinter;
use phantom_gateway::users::UserStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const SIGNING_KEY_SECRET: &str = "gemini-live-service-account-key";
pub const AUDIENCE: &str = "https://generativelanguage.googleapis.com/";
pub const JWT_SECRET: &str = "integration-hmac-secret-0123456789";
pub const CLIENT_EMAIL: &str = "gemini-live@myphantomdev.iam.gserviceaccount.com";

/// Secret store backed by a map; missing names fail like a denied access
pub struct FakeSecretStore {
    values: HashMap<String, String>,
    calls: AtomicUsize,
}

impl FakeSecretStore {
    pub fn complete() -> Self {
        let mut values = HashMap::new();
        values.insert(
            SIGNING_KEY_SECRET.to_string(),
            serde_json::json!({"client_email": CLIENT_EMAIL, "jwt_secret": JWT_SECRET}).to_string(),
        );
        values.insert("GOOGLE_OAUTH_CLIENT_ID".to_string(), "client-123".to_string());
        values.insert("GOOGLE_OAUTH_CLIENT_SECRET".to_string(), "shh".to_string());
        Self {
            values,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self {
            values: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn access_latest(&self, name: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.values
            .get(name)
            .map(|v| v.clone().into_bytes())
            .ok_or_else(|| anyhow!("PERMISSION_DENIED on {}", name))
    }

    fn backend_name(&self) -> &'static str {
        "fake"
    }
}

/// Token endpoint fake; `refresh_token` is what an exchange yields
#[derive(Default)]
pub struct FakeTokenEndpoint {
    pub refresh_token: Option<String>,
    pub fail: bool,
    pub delay: Option<Duration>,
    pub refreshed_with: Mutex<Vec<String>>,
}

#[async_trait]
impl TokenEndpoint for FakeTokenEndpoint {
    async fn exchange_code(
        &self,
        _client: &ClientCredentials,
        _code: &str,
        _redirect_uri: &str,
    ) -> Result<TokenSet> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(anyhow!("Token endpoint rejected authorization_code grant: invalid_grant"));
        }
        Ok(TokenSet {
            access_token: "ya29.access".to_string(),
            refresh_token: self.refresh_token.clone(),
            expires_at: None,
            scope: None,
        })
    }

    async fn refresh_access_token(
        &self,
        _client: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<TokenSet> {
        self.refreshed_with
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        if self.fail {
            return Err(anyhow!("Token endpoint rejected refresh_token grant: invalid_grant"));
        }
        Ok(TokenSet {
            access_token: "ya29.access".to_string(),
            refresh_token: None,
            expires_at: None,
            scope: None,
        })
    }
}

/// Course directory returning a fixed list
#[derive(Default)]
pub struct FakeCourses {
    pub courses: Vec<Course>,
    pub fail: bool,
}

#[async_trait]
impl CourseDirectory for FakeCourses {
    async fn list_courses(&self, _access_token: &str) -> Result<Vec<Course>> {
        if self.fail {
            return Err(anyhow!("Classroom API returned 500 INTERNAL: backend error"));
        }
        Ok(self.courses.clone())
    }
}

pub fn course(id: &str, name: &str) -> Course {
    Course {
        id: id.to_string(),
        name: name.to_string(),
        section: None,
        description_heading: None,
        course_state: None,
        alternate_link: None,
    }
}

pub struct TestApp {
    pub router: Router,
    pub secrets: Arc<FakeSecretStore>,
    pub endpoint: Arc<FakeTokenEndpoint>,
    pub users: Arc<UserStore>,
}

pub struct TestAppBuilder {
    secrets: FakeSecretStore,
    endpoint: FakeTokenEndpoint,
    courses: FakeCourses,
    call_timeout: Duration,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            secrets: FakeSecretStore::complete(),
            endpoint: FakeTokenEndpoint::default(),
            courses: FakeCourses::default(),
            call_timeout: Duration::from_secs(5),
        }
    }

    pub fn secrets(mut self, secrets: FakeSecretStore) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn endpoint(mut self, endpoint: FakeTokenEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn courses(mut self, courses: FakeCourses) -> Self {
        self.courses = courses;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn build(self) -> TestApp {
        let secrets = Arc::new(self.secrets);
        let endpoint = Arc::new(self.endpoint);
        let cache = Arc::new(SecretCache::new(secrets.clone(), self.call_timeout));
        let users = Arc::new(UserStore::new(":memory:", &BASE64.encode([9u8; 32])).unwrap());

        let oauth = Arc::new(OAuthSessionManager::new(
            cache.clone(),
            users.clone(),
            endpoint.clone(),
            Arc::new(self.courses),
            OAuthSettings {
                client_id_secret: "GOOGLE_OAUTH_CLIENT_ID".to_string(),
                client_secret_secret: "GOOGLE_OAUTH_CLIENT_SECRET".to_string(),
                redirect_uri: "http://localhost:3000/oauth-callback".to_string(),
                auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                scopes: vec![
                    "https://www.googleapis.com/auth/classroom.courses.readonly".to_string(),
                ],
            },
            self.call_timeout,
        ));
        let minter = Arc::new(TokenMinter::new(
            cache,
            SIGNING_KEY_SECRET,
            AUDIENCE,
            SigningAlgorithm::Hs256,
        ));

        let router = create_router(GatewayState {
            oauth,
            minter,
            users: users.clone(),
        });

        TestApp {
            router,
            secrets,
            endpoint,
            users,
        }
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn put_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}
