use anyhow::{Context, Result};
use axum::http::HeaderValue;
use phantom_gateway::api::{create_router, GatewayState};
use phantom_gateway::config::{load_config, GatewayConfig, SecretBackend};
use phantom_gateway::oauth::{ClassroomClient, HttpTokenEndpoint, OAuthSessionManager, OAuthSettings};
use phantom_gateway::secrets::{EnvSecretStore, GcpSecretManager, SecretCache, SecretStore};
use phantom_gateway::token::TokenMinter;
use phantom_gateway::users::UserStore;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "phantom_gateway=info".into()),
        )
        .init();

    info!("Phantom gateway starting...");

    let mut config = match std::env::var("PHANTOM_CONFIG") {
        Ok(path) => load_config(&path)?,
        Err(_) => GatewayConfig::default(),
    };
    config.apply_env_overrides();

    info!(
        host = %config.server.host,
        port = config.server.port,
        secrets_backend = ?config.secrets.backend,
        project_id = %config.secrets.project_id,
        database_path = %config.storage.database_path,
        signing_algorithm = ?config.token.algorithm,
        "Configuration loaded"
    );

    let call_timeout = config.timeouts.external_call();
    let http = reqwest::Client::builder()
        .timeout(call_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let store: Arc<dyn SecretStore> = match config.secrets.backend {
        SecretBackend::Gcp => Arc::new(GcpSecretManager::from_config(http.clone(), &config.secrets)),
        SecretBackend::Env => {
            warn!("Using environment secret store (development only)");
            Arc::new(EnvSecretStore::default())
        }
    };
    let secrets = Arc::new(SecretCache::new(store, call_timeout));

    // User store key comes from config or from the secret store
    let encryption_key = match config.storage.encryption_key.clone() {
        Some(key) => key,
        None => secrets
            .get_secret(&config.storage.encryption_key_secret)
            .await
            .map(|key| key.trim().to_string())
            .context("User store encryption key unavailable")?,
    };
    let users = Arc::new(
        UserStore::new(&config.storage.database_path, &encryption_key)
            .context("Failed to initialize user store")?,
    );
    info!(cached_secrets = secrets.cached_count(), "User store initialized");

    let oauth = Arc::new(OAuthSessionManager::new(
        Arc::clone(&secrets),
        Arc::clone(&users),
        Arc::new(HttpTokenEndpoint::new(http.clone(), &config.oauth.token_url)),
        Arc::new(ClassroomClient::new(http, &config.classroom)),
        OAuthSettings::from_config(&config),
        call_timeout,
    ));
    let minter = Arc::new(TokenMinter::from_config(Arc::clone(&secrets), &config));
    info!(audience = %minter.audience(), "Token minter ready");

    let state = GatewayState {
        oauth,
        minter,
        users,
    };

    let app = create_router(state)
        .layer(cors_layer(&config.server.allowed_origins))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl_c signal");
            }
            info!("Shutdown signal received");
        })
        .await
        .context("Gateway server error")?;

    info!("Phantom gateway stopped");
    Ok(())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(origins)
}
