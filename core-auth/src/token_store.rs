//! Persistent token storage.
//!
//! Three slots in the host's secure store: the SSO session token, the OAuth
//! access token bundle, and a stable device identifier. Values are JSON in
//! the store; a slot that fails to parse is treated as corrupt, deleted, and
//! reported, so the caller falls back to re-authentication instead of
//! looping on bad data.
//!
//! No slot is cached in memory. Every read goes to the store, which is what
//! keeps multiple client instances over the same store consistent.

use bridge_traits::SecureStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::types::{AccessToken, SsoToken};

const SSO_TOKEN_KEY: &str = "core_auth.sso_token";
const ACCESS_TOKEN_KEY: &str = "core_auth.access_token";
const DEVICE_ID_KEY: &str = "core_auth.device_id";

/// Token slots over a shared secure store.
#[derive(Clone)]
pub struct TokenStorage {
    store: Arc<dyn SecureStore>,
}

impl TokenStorage {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self { store }
    }

    async fn load_slot<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.store.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, "stored value is corrupt, deleting");
                self.store.delete(key).await?;
                Err(AuthError::Storage(format!(
                    "stored value for '{}' was corrupt and has been removed: {}",
                    key, e
                )))
            }
        }
    }

    async fn save_slot<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.set(key, &bytes).await?;
        Ok(())
    }

    pub async fn load_sso_token(&self) -> Result<Option<SsoToken>> {
        self.load_slot(SSO_TOKEN_KEY).await
    }

    pub async fn save_sso_token(&self, token: &SsoToken) -> Result<()> {
        self.save_slot(SSO_TOKEN_KEY, token).await
    }

    pub async fn clear_sso_token(&self) -> Result<()> {
        self.store.delete(SSO_TOKEN_KEY).await?;
        Ok(())
    }

    pub async fn load_access_token(&self) -> Result<Option<AccessToken>> {
        self.load_slot(ACCESS_TOKEN_KEY).await
    }

    pub async fn save_access_token(&self, token: &AccessToken) -> Result<()> {
        self.save_slot(ACCESS_TOKEN_KEY, token).await
    }

    pub async fn clear_access_token(&self) -> Result<()> {
        self.store.delete(ACCESS_TOKEN_KEY).await?;
        Ok(())
    }

    /// Stable device identifier, created on first use.
    pub async fn device_id(&self) -> Result<String> {
        if let Some(id) = self.load_slot::<String>(DEVICE_ID_KEY).await? {
            return Ok(id);
        }
        let id = Uuid::new_v4().to_string();
        self.save_slot(DEVICE_ID_KEY, &id).await?;
        Ok(id)
    }

    /// Remove both token slots. The device identifier survives logout.
    pub async fn clear_tokens(&self) -> Result<()> {
        self.clear_access_token().await?;
        self.clear_sso_token().await?;
        Ok(())
    }
}

impl std::fmt::Debug for TokenStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStorage").finish()
    }
}
