//! OAuth 2.0 Authorization Flow with PKCE
//!
//! Implements the authorization code grant (RFC 6749) with PKCE (RFC 7636)
//! against the server's realm-scoped OAuth 2.0 endpoints. The flow here is
//! non-interactive: the SSO session token stands in for the user, so the
//! authorize call returns a 302 straight to the redirect URI with the code
//! attached.
//!
//! # Security
//!
//! - PKCE S256 on every authorization
//! - Random state parameter, verified on the way back (CSRF protection)
//! - Token values, codes, and verifiers are never logged

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::{HttpMethod, HttpRequest, RequestAction};
use core_runtime::CoreConfig;
use rand::Rng;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{AuthError, FailureStage, Result};
use crate::interceptor::Dispatcher;
use crate::types::{AccessToken, SsoToken, UserInfo};

/// PKCE (Proof Key for Code Exchange) verifier.
///
/// The verifier stays on this side; only the S256 challenge derived from it
/// is sent during authorization.
#[derive(Debug, Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    /// Create a new PKCE verifier with cryptographically secure random values.
    ///
    /// Generates a 32-byte code verifier and a 16-byte state parameter, both
    /// URL-safe base64 encoded without padding.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        // Code verifier must be 43-128 characters per RFC 7636
        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Self { verifier, state }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// Compute the code challenge: BASE64URL(SHA256(code_verifier)).
    pub fn challenge(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Token response from the OAuth 2.0 token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    refresh_token: Option<String>,
    id_token: Option<String>,
    scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// OAuth 2.0 client over the deployment's realm-scoped endpoints.
pub struct OAuth2Client {
    config: CoreConfig,
    dispatcher: Dispatcher,
}

impl OAuth2Client {
    pub fn new(config: CoreConfig, dispatcher: Dispatcher) -> Self {
        Self { config, dispatcher }
    }

    /// Obtain an authorization code for the given session.
    ///
    /// Sends the authorize request with the session token in the configured
    /// cookie header and PKCE parameters in the query. The server answers
    /// with a 302 whose `Location` carries the code; redirects must not be
    /// followed by the transport.
    #[instrument(skip(self, session, verifier))]
    pub async fn authorize(&self, session: &SsoToken, verifier: &PkceVerifier) -> Result<String> {
        let oauth = self.config.oauth_settings()?;

        let mut url = self.config.authorize_url();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &oauth.client_id);
            query.append_pair("redirect_uri", &oauth.redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("scope", &oauth.scope);
            query.append_pair("state", verifier.state());
            query.append_pair("code_challenge", &verifier.challenge());
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("decision", "allow");
            query.append_pair("csrf", session.value());
        }

        let request = HttpRequest::new(HttpMethod::Get, url, RequestAction::Authorize)
            .header(&self.config.cookie_name, session.value())
            .timeout(self.config.timeout);

        let response = self.dispatcher.execute(request).await?;

        if !response.is_redirect() {
            let status = response.status;
            let body = response
                .text()
                .unwrap_or_else(|_| "unreadable response body".to_string());
            warn!(status, "authorize did not redirect");
            return Err(AuthError::AuthenticationFailed {
                reason: "authorization rejected".to_string(),
                stage: FailureStage::Token,
                detail: format!("authorize endpoint returned {}: {}", status, body),
            });
        }

        let location = response.header("Location").ok_or_else(|| {
            AuthError::Protocol("authorize redirect carries no Location header".to_string())
        })?;

        extract_code(location, verifier.state())
    }

    /// Exchange an authorization code for tokens.
    #[instrument(skip(self, code, verifier))]
    pub async fn exchange_code(&self, code: &str, verifier: &PkceVerifier) -> Result<AccessToken> {
        let oauth = self.config.oauth_settings()?;

        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", &oauth.redirect_uri);
        params.insert("client_id", &oauth.client_id);
        params.insert("code_verifier", verifier.verifier());

        debug!("exchanging authorization code for tokens");
        self.token_request(params, RequestAction::ExchangeToken)
            .await
    }

    /// Mint a full access token bundle for a session: authorize, then
    /// exchange. The returned bundle is bound to the session token.
    #[instrument(skip(self, session))]
    pub async fn token_for_session(&self, session: &SsoToken) -> Result<AccessToken> {
        let verifier = PkceVerifier::new();
        let code = self.authorize(session, &verifier).await?;
        let mut token = self.exchange_code(&code, &verifier).await?;
        token.session_token = Some(session.value().to_string());
        Ok(token)
    }

    /// Refresh an access token.
    ///
    /// Servers that rotate refresh tokens return a new one; servers that do
    /// not omit the field, in which case the old refresh token is carried
    /// forward so later refreshes still work.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<AccessToken> {
        let oauth = self.config.oauth_settings()?;

        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", &oauth.client_id);
        params.insert("scope", &oauth.scope);

        debug!("refreshing access token");
        let mut token = self
            .token_request(params, RequestAction::RefreshToken)
            .await?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }

    /// Revoke a token at the server.
    ///
    /// Revoking the refresh token invalidates the whole grant, so it is
    /// preferred when present.
    #[instrument(skip(self, token))]
    pub async fn revoke(&self, token: &AccessToken) -> Result<()> {
        let oauth = self.config.oauth_settings()?;

        let revoke_target = token.refresh_token.as_deref().unwrap_or_else(|| token.value());

        let mut params = HashMap::new();
        params.insert("client_id", oauth.client_id.as_str());
        params.insert("token", revoke_target);

        let body = serde_urlencoded::to_string(&params)
            .map_err(|e| AuthError::Serialization(e.to_string()))?;

        let request = HttpRequest::new(
            HttpMethod::Post,
            self.config.revoke_url(),
            RequestAction::RevokeToken,
        )
        .form(body)
        .timeout(self.config.timeout);

        self.dispatcher
            .execute_expect_success(request, |status, body| AuthError::Protocol(format!(
                "revocation endpoint returned {}: {}",
                status, body
            )))
            .await?;

        debug!("token revoked");
        Ok(())
    }

    /// Fetch the userinfo claims for an access token.
    #[instrument(skip(self, token))]
    pub async fn user_info(&self, token: &AccessToken) -> Result<UserInfo> {
        let request = HttpRequest::new(
            HttpMethod::Get,
            self.config.userinfo_url(),
            RequestAction::UserInfo,
        )
        .bearer_token(token.value())
        .timeout(self.config.timeout);

        let response = self
            .dispatcher
            .execute_expect_success(request, |status, body| {
                if status == 401 {
                    AuthError::AuthenticationExpired
                } else {
                    AuthError::Protocol(format!("userinfo endpoint returned {}: {}", status, body))
                }
            })
            .await?;

        response
            .json()
            .map_err(|e| AuthError::Protocol(format!("unparseable userinfo response: {}", e)))
    }

    async fn token_request(
        &self,
        params: HashMap<&str, &str>,
        action: RequestAction,
    ) -> Result<AccessToken> {
        let body = serde_urlencoded::to_string(&params)
            .map_err(|e| AuthError::Serialization(e.to_string()))?;

        let request = HttpRequest::new(HttpMethod::Post, self.config.token_url(), action)
            .form(body)
            .timeout(self.config.timeout);

        let response = self
            .dispatcher
            .execute_expect_success(request, move |status, body| {
                warn!(status, "token endpoint rejected request");
                AuthError::AuthenticationFailed {
                    reason: "token grant rejected".to_string(),
                    stage: FailureStage::Token,
                    detail: format!("token endpoint returned {}: {}", status, body),
                }
            })
            .await?;

        let wire: TokenResponse = response
            .json()
            .map_err(|e| AuthError::Protocol(format!("unparseable token response: {}", e)))?;

        debug!(expires_in = wire.expires_in, "token grant succeeded");

        let mut token = AccessToken::new(wire.access_token, wire.token_type, wire.expires_in);
        token.refresh_token = wire.refresh_token;
        token.id_token = wire.id_token;
        token.scope = wire.scope;
        Ok(token)
    }
}

/// Pull the authorization code out of a redirect `Location`, verifying the
/// state echoed by the server.
fn extract_code(location: &str, expected_state: &str) -> Result<String> {
    let url = Url::parse(location)
        .map_err(|e| AuthError::Protocol(format!("unparseable redirect Location: {}", e)))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(AuthError::AuthenticationFailed {
            reason: error,
            stage: FailureStage::Token,
            detail: format!("authorization redirect reported an error: {}", location),
        });
    }

    match state {
        Some(ref s) if s == expected_state => {}
        other => {
            warn!("authorization state mismatch");
            return Err(AuthError::Protocol(format!(
                "state mismatch on authorization redirect (got {:?})",
                other.map(|_| "[REDACTED]")
            )));
        }
    }

    code.ok_or_else(|| {
        AuthError::Protocol("authorization redirect carries no code parameter".to_string())
    })
}
