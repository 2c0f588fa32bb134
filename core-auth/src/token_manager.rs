//! Access token lifecycle.
//!
//! `get_access_token` is the single entry point for callers that need a
//! usable bearer token. It reads the stored bundle fresh on every call and
//! repairs whatever it finds: a bundle bound to a departed session is
//! revoked and re-minted, an expired bundle is refreshed (falling back to
//! re-minting when the refresh token is rejected), and an empty slot is
//! filled by minting against the current session.
//!
//! Refresh and mint run under a per-manager mutex so concurrent callers do
//! not race to refresh the same grant; whoever loses the race re-reads the
//! slot and finds the winner's token.

use core_runtime::{CoreEvent, EventBus, TokenEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::error::{AuthError, Result};
use crate::oauth::OAuth2Client;
use crate::token_store::TokenStorage;
use crate::types::{AccessToken, SsoToken, DEFAULT_EXPIRY_BUFFER_SECS};

pub struct TokenManager {
    storage: TokenStorage,
    oauth: Arc<OAuth2Client>,
    events: EventBus,
    refresh_lock: Mutex<()>,
    expiry_buffer_secs: i64,
}

impl TokenManager {
    pub fn new(storage: TokenStorage, oauth: Arc<OAuth2Client>, events: EventBus) -> Self {
        Self {
            storage,
            oauth,
            events,
            refresh_lock: Mutex::new(()),
            expiry_buffer_secs: DEFAULT_EXPIRY_BUFFER_SECS,
        }
    }

    /// Override the expiry buffer (seconds before nominal expiry at which a
    /// token counts as expired).
    pub fn with_expiry_buffer(mut self, secs: i64) -> Self {
        self.expiry_buffer_secs = secs;
        self
    }

    /// Return a usable access token for the current session.
    ///
    /// # Errors
    ///
    /// [`AuthError::AuthenticationRequired`] when there is no session to
    /// mint against; any repair path that needs the network can also fail
    /// with transport or protocol errors.
    #[instrument(skip(self))]
    pub async fn get_access_token(&self) -> Result<AccessToken> {
        let session = self
            .storage
            .load_sso_token()
            .await?
            .ok_or(AuthError::AuthenticationRequired)?;

        if let Some(token) = self.usable_stored_token(&session).await? {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have repaired the slot while we waited.
        if let Some(token) = self.usable_stored_token(&session).await? {
            return Ok(token);
        }

        let stored = self.storage.load_access_token().await?;

        match stored {
            Some(token) if !token.is_bound_to(session.value()) => {
                debug!("stored bundle belongs to a different session, re-minting");
                if let Err(e) = self.oauth.revoke(&token).await {
                    warn!(error = %e, "failed to revoke mismatched access token");
                }
                self.storage.clear_access_token().await?;
                self.mint(&session).await
            }
            Some(token) => match token.refresh_token.clone() {
                Some(refresh_token) => match self.oauth.refresh(&refresh_token).await {
                    Ok(mut refreshed) => {
                        refreshed.session_token = token.session_token;
                        self.storage.save_access_token(&refreshed).await?;
                        self.events
                            .emit(CoreEvent::Token(TokenEvent::Refreshed {
                                expires_at: refreshed.expires_at.timestamp(),
                            }))
                            .ok();
                        Ok(refreshed)
                    }
                    Err(e) => {
                        warn!(error = %e, "refresh failed, falling back to re-minting");
                        self.events
                            .emit(CoreEvent::Token(TokenEvent::RefreshFailed {
                                message: e.to_string(),
                            }))
                            .ok();
                        self.storage.clear_access_token().await?;
                        // Refresh and re-mint both failing means the session
                        // can no longer produce tokens.
                        match self.mint(&session).await {
                            Ok(token) => Ok(token),
                            Err(mint_err) => {
                                warn!(error = %mint_err, "re-mint after failed refresh also failed");
                                Err(AuthError::AuthenticationRequired)
                            }
                        }
                    }
                },
                None => {
                    debug!("expired bundle has no refresh token, re-minting");
                    self.storage.clear_access_token().await?;
                    self.mint(&session).await
                }
            },
            None => self.mint(&session).await,
        }
    }

    /// Whether an access token bundle is stored. Presence only, no expiry
    /// or binding check, no network.
    pub async fn has_token(&self) -> Result<bool> {
        Ok(self.storage.load_access_token().await?.is_some())
    }

    /// Drop the stored bundle without revoking it. The session slot is not
    /// touched.
    pub async fn clear(&self) -> Result<()> {
        self.storage.clear_access_token().await
    }

    /// Revoke the stored bundle at the server and drop it from storage.
    ///
    /// Revocation is best effort; the local slot is cleared regardless.
    #[instrument(skip(self))]
    pub async fn revoke_stored(&self) -> Result<Option<AuthError>> {
        let remote_error = match self.storage.load_access_token().await {
            Ok(Some(token)) => self.oauth.revoke(&token).await.err(),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "could not read access token slot for revocation");
                None
            }
        };
        self.storage.clear_access_token().await?;
        if remote_error.is_none() {
            self.events.emit(CoreEvent::Token(TokenEvent::Revoked)).ok();
        }
        Ok(remote_error)
    }

    async fn usable_stored_token(&self, session: &SsoToken) -> Result<Option<AccessToken>> {
        let Some(token) = self.storage.load_access_token().await? else {
            return Ok(None);
        };
        if token.is_bound_to(session.value())
            && !token.is_expired_with_buffer(self.expiry_buffer_secs)
        {
            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    async fn mint(&self, session: &SsoToken) -> Result<AccessToken> {
        let token = self.oauth.token_for_session(session).await?;
        self.storage.save_access_token(&token).await?;
        self.events
            .emit(CoreEvent::Token(TokenEvent::Minted {
                expires_at: token.expires_at.timestamp(),
            }))
            .ok();
        Ok(token)
    }
}
