//! SSO session management.
//!
//! Holds no state of its own: every read goes to the shared secure store, so
//! any number of client instances over the same store observe the same
//! session. A token persisted by one instance is immediately visible to the
//! others.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::oauth::OAuth2Client;
use crate::token_store::TokenStorage;
use crate::types::SsoToken;

pub struct SingleSignOnManager {
    storage: TokenStorage,
    oauth: Arc<OAuth2Client>,
}

impl SingleSignOnManager {
    pub fn new(storage: TokenStorage, oauth: Arc<OAuth2Client>) -> Self {
        Self { storage, oauth }
    }

    /// The current session token, read fresh from the store.
    pub async fn current_token(&self) -> Result<Option<SsoToken>> {
        self.storage.load_sso_token().await
    }

    /// Whether a session token is present in the store.
    ///
    /// Presence only; the token may have been invalidated server-side.
    pub async fn has_session(&self) -> Result<bool> {
        Ok(self.storage.load_sso_token().await?.is_some())
    }

    /// Persist a session token obtained from a tree traversal.
    ///
    /// When the new token replaces a different existing session, any access
    /// token bundle minted against the old session is revoked at the server
    /// (best effort) and dropped, so stale grants do not outlive the session
    /// they belong to.
    #[instrument(skip(self, token))]
    pub async fn persist_token(&self, token: &SsoToken) -> Result<()> {
        let previous = self.storage.load_sso_token().await?;

        let replacing = previous
            .as_ref()
            .map(|prev| prev.value() != token.value())
            .unwrap_or(false);

        if replacing {
            debug!("session token replaced, discarding old access token bundle");
            if let Ok(Some(old_bundle)) = self.storage.load_access_token().await {
                if let Err(e) = self.oauth.revoke(&old_bundle).await {
                    warn!(error = %e, "failed to revoke superseded access token");
                }
            }
            self.storage.clear_access_token().await?;
        }

        self.storage.save_sso_token(token).await
    }

    /// Remove the session token from the store.
    pub async fn clear(&self) -> Result<()> {
        self.storage.clear_sso_token().await
    }
}
