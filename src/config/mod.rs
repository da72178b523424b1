use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub classroom: ClassroomConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Empty = any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Where secrets come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretBackend {
    /// Google Secret Manager REST API
    Gcp,
    /// `PHANTOM_SECRET_*` environment variables (local development)
    Env,
}

impl std::str::FromStr for SecretBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gcp" => Ok(SecretBackend::Gcp),
            "env" => Ok(SecretBackend::Env),
            other => Err(format!("unknown secret backend '{}'", other)),
        }
    }
}

/// Secret store configuration and logical secret names
#[derive(Debug, Clone, Deserialize)]
pub struct SecretsConfig {
    #[serde(default = "default_secret_backend")]
    pub backend: SecretBackend,
    #[serde(default = "default_project_id")]
    pub project_id: String,
    #[serde(default = "default_secret_manager_url")]
    pub api_base_url: String,
    /// Static bearer token for Secret Manager; falls back to the metadata server
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_metadata_token_url")]
    pub metadata_token_url: String,
    #[serde(default = "default_signing_key_secret")]
    pub signing_key_secret: String,
    #[serde(default = "default_client_id_secret")]
    pub oauth_client_id_secret: String,
    #[serde(default = "default_client_secret_secret")]
    pub oauth_client_secret_secret: String,
}

fn default_secret_backend() -> SecretBackend {
    SecretBackend::Gcp
}

fn default_project_id() -> String {
    "myphantomdev".to_string()
}

fn default_secret_manager_url() -> String {
    "https://secretmanager.googleapis.com".to_string()
}

fn default_metadata_token_url() -> String {
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token"
        .to_string()
}

fn default_signing_key_secret() -> String {
    "gemini-live-service-account-key".to_string()
}

fn default_client_id_secret() -> String {
    "GOOGLE_OAUTH_CLIENT_ID".to_string()
}

fn default_client_secret_secret() -> String {
    "GOOGLE_OAUTH_CLIENT_SECRET".to_string()
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            backend: default_secret_backend(),
            project_id: default_project_id(),
            api_base_url: default_secret_manager_url(),
            access_token: None,
            metadata_token_url: default_metadata_token_url(),
            signing_key_secret: default_signing_key_secret(),
            oauth_client_id_secret: default_client_id_secret(),
            oauth_client_secret_secret: default_client_secret_secret(),
        }
    }
}

/// Google OAuth endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_redirect_uri() -> String {
    "http://localhost:3000/oauth-callback".to_string()
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/classroom.courses.readonly".to_string()]
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            redirect_uri: default_redirect_uri(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            scopes: default_scopes(),
        }
    }
}

/// Google Classroom API
#[derive(Debug, Clone, Deserialize)]
pub struct ClassroomConfig {
    #[serde(default = "default_classroom_url")]
    pub api_base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Upper bound on pages followed per listing
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_classroom_url() -> String {
    "https://classroom.googleapis.com".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    20
}

impl Default for ClassroomConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_classroom_url(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

/// JWT algorithm used for ephemeral tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SigningAlgorithm {
    /// HMAC-SHA256 with the key's `jwt_secret`
    #[serde(rename = "HS256")]
    Hs256,
    /// RSA-SHA256 with the key's PEM `private_key`
    #[serde(rename = "RS256")]
    Rs256,
}

impl std::str::FromStr for SigningAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HS256" => Ok(SigningAlgorithm::Hs256),
            "RS256" => Ok(SigningAlgorithm::Rs256),
            other => Err(format!("unsupported signing algorithm '{}'", other)),
        }
    }
}

/// Ephemeral token minting
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: SigningAlgorithm,
}

fn default_audience() -> String {
    "https://generativelanguage.googleapis.com/".to_string()
}

fn default_algorithm() -> SigningAlgorithm {
    SigningAlgorithm::Hs256
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            audience: default_audience(),
            algorithm: default_algorithm(),
        }
    }
}

/// User store
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Base64 32-byte key; when unset it is read from `encryption_key_secret`
    #[serde(default)]
    pub encryption_key: Option<String>,
    #[serde(default = "default_encryption_key_secret")]
    pub encryption_key_secret: String,
}

fn default_database_path() -> String {
    "phantom-users.db".to_string()
}

fn default_encryption_key_secret() -> String {
    "phantom-user-store-key".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            encryption_key: None,
            encryption_key_secret: default_encryption_key_secret(),
        }
    }
}

/// External call budgets
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_external_call_seconds")]
    pub external_call_seconds: u64,
}

fn default_external_call_seconds() -> u64 {
    10
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            external_call_seconds: default_external_call_seconds(),
        }
    }
}

impl TimeoutConfig {
    pub fn external_call(&self) -> Duration {
        Duration::from_secs(self.external_call_seconds.max(1))
    }
}

impl GatewayConfig {
    /// Apply `PHANTOM_*` environment overrides on top of file/default values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Unparseable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PHANTOM_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PHANTOM_PORT").or_else(|| lookup("PORT")) {
            if let Ok(port) = v.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Some(v) = lookup("PHANTOM_SECRETS_BACKEND") {
            if let Ok(backend) = v.parse::<SecretBackend>() {
                self.secrets.backend = backend;
            }
        }
        if let Some(v) = lookup("PHANTOM_SECRETS_PROJECT_ID").or_else(|| lookup("GCLOUD_PROJECT")) {
            self.secrets.project_id = v;
        }
        if let Some(v) = lookup("PHANTOM_SECRETS_ACCESS_TOKEN") {
            self.secrets.access_token = Some(v);
        }
        if let Some(v) = lookup("PHANTOM_SIGNING_KEY_SECRET") {
            self.secrets.signing_key_secret = v;
        }
        if let Some(v) = lookup("PHANTOM_OAUTH_CLIENT_ID_SECRET") {
            self.secrets.oauth_client_id_secret = v;
        }
        if let Some(v) = lookup("PHANTOM_OAUTH_CLIENT_SECRET_SECRET") {
            self.secrets.oauth_client_secret_secret = v;
        }
        if let Some(v) = lookup("PHANTOM_OAUTH_REDIRECT_URI") {
            self.oauth.redirect_uri = v;
        }
        if let Some(v) = lookup("PHANTOM_TOKEN_AUDIENCE") {
            self.token.audience = v;
        }
        if let Some(v) = lookup("PHANTOM_TOKEN_ALGORITHM") {
            if let Ok(alg) = v.parse::<SigningAlgorithm>() {
                self.token.algorithm = alg;
            }
        }
        if let Some(v) = lookup("PHANTOM_DATABASE_PATH") {
            self.storage.database_path = v;
        }
        if let Some(v) = lookup("PHANTOM_ENCRYPTION_KEY") {
            self.storage.encryption_key = Some(v);
        }
        if let Some(v) = lookup("PHANTOM_EXTERNAL_CALL_TIMEOUT_SECONDS") {
            if let Ok(n) = v.parse::<u64>() {
                self.timeouts.external_call_seconds = n;
            }
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<GatewayConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: GatewayConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path))?;
    Ok(config)
}
