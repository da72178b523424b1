//! Process-lifetime secret cache.
//!
//! Secrets (service-account signing key, OAuth client id/secret, user store key)
//! are fetched lazily from a [`SecretStore`] and held in memory until the process
//! exits. Each name has its own `OnceCell`, so concurrent first requests for the
//! same secret share a single store call. A failed fetch leaves the cell empty
//! and the next caller tries again.
//!
//! ```text
//! get_secret(name)
//!   ├─ cell initialized ──────────────► cached value (no store call)
//!   └─ cell empty ─► lock cell ─► store.access_latest(name)
//!                                  ├─ ok: utf-8, non-empty ─► cache + return
//!                                  └─ err ─► log, SecretUnavailable(name)
//! ```
//!
//! Rotation is not handled: a rotated secret is picked up on restart.

mod env;
mod gcp;


pub use env::EnvSecretStore;
pub use gcp::GcpSecretManager;

use crate::error::{with_timeout, GatewayError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

/// Backend holding versioned secret material.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Return the raw payload of the latest version of `name`.
    async fn access_latest(&self, name: &str) -> anyhow::Result<Vec<u8>>;

    /// Short backend label for logs
    fn backend_name(&self) -> &'static str;
}

/// Memoizing, single-flight front for a [`SecretStore`].
pub struct SecretCache {
    store: Arc<dyn SecretStore>,
    cells: DashMap<String, Arc<OnceCell<Arc<str>>>>,
    call_timeout: Duration,
}

impl SecretCache {
    pub fn new(store: Arc<dyn SecretStore>, call_timeout: Duration) -> Self {
        Self {
            store,
            cells: DashMap::new(),
            call_timeout,
        }
    }

    /// Returns the secret text for `name`, fetching it on first use.
    ///
    /// # Errors
    /// - `SecretUnavailable(name)` if the store fails, the payload is empty, or
    ///   it is not valid UTF-8
    /// - `DownstreamTimeout` if the store does not answer in time
    pub async fn get_secret(&self, name: &str) -> Result<Arc<str>, GatewayError> {
        if name.trim().is_empty() {
            return Err(GatewayError::SecretUnavailable("<empty name>".to_string()));
        }

        let cell = self
            .cells
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        if let Some(value) = cell.get() {
            return Ok(value.clone());
        }

        let value = cell.get_or_try_init(|| self.fetch(name)).await?;
        Ok(value.clone())
    }

    /// Returns the secret parsed as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, name: &str) -> Result<T, GatewayError> {
        let raw = self.get_secret(name).await?;
        serde_json::from_str(&raw).map_err(|e| {
            // serde_json errors carry position only, never content
            error!(secret = %name, error = %e, "Secret payload is not valid JSON");
            GatewayError::SecretUnavailable(name.to_string())
        })
    }

    /// Number of secrets currently held in memory
    pub fn cached_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    async fn fetch(&self, name: &str) -> Result<Arc<str>, GatewayError> {
        debug!(
            secret = %name,
            backend = self.store.backend_name(),
            "Fetching secret from store"
        );

        let payload = with_timeout(
            self.call_timeout,
            "secret store",
            self.store.access_latest(name),
        )
        .await?
        .map_err(|e| {
            error!(
                secret = %name,
                backend = self.store.backend_name(),
                error = %format!("{:#}", e),
                "Failed to access secret"
            );
            GatewayError::SecretUnavailable(name.to_string())
        })?;

        if payload.is_empty() {
            error!(secret = %name, "Secret store returned an empty payload");
            return Err(GatewayError::SecretUnavailable(name.to_string()));
        }

        let text = String::from_utf8(payload).map_err(|_| {
            error!(secret = %name, "Secret payload is not valid UTF-8");
            GatewayError::SecretUnavailable(name.to_string())
        })?;

        if text.trim().is_empty() {
            error!(secret = %name, "Secret payload is blank");
            return Err(GatewayError::SecretUnavailable(name.to_string()));
        }

        info!(secret = %name, "Secret cached for process lifetime");
        Ok(Arc::from(text))
    }
}
