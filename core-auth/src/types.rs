//! Core authentication types.
//!
//! Token values are secrets. Both [`SsoToken`] and [`AccessToken`] implement
//! `Debug` by hand so their values never leak through logging or panics.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Buffer subtracted from the expiry when deciding whether an access token
/// is still usable. Covers clock skew and in-flight request time.
pub const DEFAULT_EXPIRY_BUFFER_SECS: i64 = 15;

/// An SSO session token issued by a successful tree traversal.
///
/// The value is opaque to the client; it is sent back to the server in the
/// session cookie header and during token minting.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoToken {
    value: String,
    /// Landing URL the server supplied alongside the token, when present.
    pub success_url: Option<String>,
}

impl SsoToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            success_url: None,
        }
    }

    pub fn with_success_url(mut self, url: impl Into<String>) -> Self {
        self.success_url = Some(url.into());
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for SsoToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsoToken")
            .field("value", &"[REDACTED]")
            .field("success_url", &self.success_url)
            .finish()
    }
}

/// An OAuth 2.0 access token bundle.
///
/// Carries the session token it was minted against so that session changes
/// invalidate the bundle, plus the refresh and ID tokens when the server
/// issued them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    value: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub scope: Option<String>,
    /// Value of the SSO token this bundle was minted against.
    pub session_token: Option<String>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, token_type: impl Into<String>, expires_in: i64) -> Self {
        Self {
            value: value.into(),
            token_type: token_type.into(),
            expires_at: Utc::now() + Duration::seconds(expires_in),
            refresh_token: None,
            id_token: None,
            scope: None,
            session_token: None,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether the token is past its expiry, using the default buffer.
    pub fn is_expired(&self) -> bool {
        self.is_expired_with_buffer(DEFAULT_EXPIRY_BUFFER_SECS)
    }

    /// Whether the token will expire within `buffer_secs` seconds.
    pub fn is_expired_with_buffer(&self, buffer_secs: i64) -> bool {
        Utc::now() + Duration::seconds(buffer_secs) >= self.expires_at
    }

    /// Whether this bundle was minted against the given session token value.
    pub fn is_bound_to(&self, session_token_value: &str) -> bool {
        self.session_token.as_deref() == Some(session_token_value)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("scope", &self.scope)
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Claims returned by the OIDC userinfo endpoint.
///
/// Standard claims get typed fields; everything else lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}
