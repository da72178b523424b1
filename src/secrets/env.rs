//! Environment-variable secret backend for local development.
//!
//! `gemini-live-service-account-key` is read from
//! `PHANTOM_SECRET_GEMINI_LIVE_SERVICE_ACCOUNT_KEY`.

use super::SecretStore;
use anyhow::{Context, Result};
use async_trait::async_trait;

const DEFAULT_PREFIX: &str = "PHANTOM_SECRET_";

pub struct EnvSecretStore {
    prefix: String,
}

impl Default for EnvSecretStore {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }
}

impl EnvSecretStore {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    /// Upper-cases the name and maps every non-alphanumeric character to `_`.
    pub fn variable_name(&self, secret_name: &str) -> String {
        let suffix: String = secret_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{}", self.prefix, suffix)
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn access_latest(&self, name: &str) -> Result<Vec<u8>> {
        let var = self.variable_name(name);
        std::env::var(&var)
            .map(String::into_bytes)
            .with_context(|| format!("Environment variable {} is not set", var))
    }

    fn backend_name(&self) -> &'static str {
        "env"
    }
}
