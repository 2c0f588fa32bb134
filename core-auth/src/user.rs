//! Authenticated user handle.
//!
//! A [`User`] is a view over the stored session: it holds no token state of
//! its own, so two handles over the same store always agree. Dropping a
//! handle changes nothing; [`User::logout`] is the only way to end the
//! session.

use bridge_traits::{HttpMethod, HttpRequest, RequestAction};
use core_runtime::{AuthLifecycleEvent, CoreEvent};
use serde_json::json;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::error::{AuthError, Result};
use crate::session::SharedCore;
use crate::types::{AccessToken, SsoToken, UserInfo};

const SESSION_API_VERSION: &str = "resource=3.1, protocol=1.0";

/// What happened during logout.
///
/// Local state is always cleared; the remote steps are best effort and
/// their failures are reported here rather than raised, so a flaky network
/// cannot leave the device signed in.
#[derive(Debug)]
pub struct LogoutReport {
    /// Error from revoking the OAuth grant, if revocation failed.
    pub token_revocation: Option<AuthError>,
    /// Error from ending the server-side session, if that failed.
    pub session_logout: Option<AuthError>,
}

impl LogoutReport {
    /// Whether both remote cleanup steps succeeded.
    pub fn fully_clean(&self) -> bool {
        self.token_revocation.is_none() && self.session_logout.is_none()
    }
}

/// Handle over the authenticated session.
pub struct User {
    shared: Arc<SharedCore>,
}

impl User {
    pub(crate) fn new(shared: Arc<SharedCore>) -> Self {
        Self { shared }
    }

    /// The current session token, read fresh from the store.
    ///
    /// # Errors
    ///
    /// [`AuthError::AuthenticationRequired`] when the session is gone (for
    /// example, another instance logged out).
    pub async fn session_token(&self) -> Result<SsoToken> {
        self.shared
            .sso
            .current_token()
            .await?
            .ok_or(AuthError::AuthenticationRequired)
    }

    /// A usable access token, minting or refreshing as needed.
    pub async fn get_access_token(&self) -> Result<AccessToken> {
        self.shared.tokens.get_access_token().await
    }

    /// OIDC userinfo claims for this user.
    pub async fn user_info(&self) -> Result<UserInfo> {
        let token = self.get_access_token().await?;
        self.shared.oauth.user_info(&token).await
    }

    /// End the session.
    ///
    /// Revokes the OAuth grant and ends the server-side session
    /// concurrently, then clears local state regardless of how the remote
    /// steps went.
    #[instrument(skip(self))]
    pub async fn logout(self) -> Result<LogoutReport> {
        let session = self.shared.sso.current_token().await?;

        let (token_revocation, session_logout) = tokio::join!(
            self.shared.tokens.revoke_stored(),
            self.end_remote_session(session.as_ref()),
        );

        let token_revocation = token_revocation?;

        self.shared.storage.clear_tokens().await?;
        self.shared
            .events
            .emit(CoreEvent::Auth(AuthLifecycleEvent::SignedOut))
            .ok();

        let report = LogoutReport {
            token_revocation,
            session_logout,
        };
        if !report.fully_clean() {
            warn!("logout left remote state behind, local state cleared");
        }
        Ok(report)
    }

    async fn end_remote_session(&self, session: Option<&SsoToken>) -> Option<AuthError> {
        let session = session?;

        let request = match HttpRequest::new(
            HttpMethod::Post,
            self.shared.config.session_logout_url(),
            RequestAction::Logout,
        )
        .header(&self.shared.config.cookie_name, session.value())
        .header("Accept-API-Version", SESSION_API_VERSION)
        .json(&json!({}))
        {
            Ok(request) => request.timeout(self.shared.config.timeout),
            Err(e) => return Some(AuthError::Serialization(e.to_string())),
        };

        self.shared
            .dispatcher
            .execute_expect_success(request, |status, body| {
                AuthError::Protocol(format!("session logout returned {}: {}", status, body))
            })
            .await
            .err()
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User").finish()
    }
}
