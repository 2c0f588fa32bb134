//! HTTP Transport Abstraction
//!
//! The core never performs network IO directly. Every outbound call is
//! described as an [`HttpRequest`] carrying a [`RequestAction`] tag and handed
//! to the host's [`HttpClient`] implementation. The tag identifies the
//! semantic operation that produced the request so that request interceptors
//! can branch on it without inspecting the wire path.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Semantic action that produced an outbound request.
///
/// Attached to the request as opaque metadata before interception; the
/// transport itself must not interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestAction {
    StartAuthenticate,
    Authenticate,
    Authorize,
    ExchangeToken,
    RefreshToken,
    RevokeToken,
    Logout,
    UserInfo,
    RegisterMechanism,
}

impl RequestAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestAction::StartAuthenticate => "START_AUTHENTICATE",
            RequestAction::Authenticate => "AUTHENTICATE",
            RequestAction::Authorize => "AUTHORIZE",
            RequestAction::ExchangeToken => "EXCHANGE_TOKEN",
            RequestAction::RefreshToken => "REFRESH_TOKEN",
            RequestAction::RevokeToken => "REVOKE_TOKEN",
            RequestAction::Logout => "LOGOUT",
            RequestAction::UserInfo => "USER_INFO",
            RequestAction::RegisterMechanism => "REGISTER_MECHANISM",
        }
    }
}

impl std::fmt::Display for RequestAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
    pub action: RequestAction,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>, action: RequestAction) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
            action,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let json = serde_json::to_vec(body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON serialization failed: {}", e))
        })?;
        self.body = Some(Bytes::from(json));
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    /// Set a `application/x-www-form-urlencoded` body from pre-encoded text.
    pub fn form(mut self, encoded: impl Into<String>) -> Self {
        self.body = Some(Bytes::from(encoded.into()));
        self.headers.insert(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        self
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// HTTP response
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Parse response body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON deserialization failed: {}", e))
        })
    }

    /// Get response body as UTF-8 string
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid UTF-8: {}", e)))
    }

    /// Look up a header by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response status indicates a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if response status indicates a redirect (3xx)
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// Async HTTP client trait
///
/// Implementations own connection pooling, TLS validation and pinning, and
/// any transport-level retry. They must carry the request's `action` tag
/// through untouched.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest, HttpMethod, RequestAction};
///
/// async fn fetch(client: &dyn HttpClient) -> Result<String> {
///     let request = HttpRequest::new(
///         HttpMethod::Get,
///         "https://openam.example.com/oauth2/userinfo",
///         RequestAction::UserInfo,
///     )
///     .bearer_token("token");
///
///     let response = client.execute(request).await?;
///     response.text()
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request.
    ///
    /// Redirects must NOT be followed automatically: the OAuth2 authorize
    /// step depends on observing the 3xx response and its `Location` header.
    ///
    /// # Errors
    ///
    /// Returns an error if the network connection fails, TLS validation
    /// fails, or the request times out.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_request_builder() {
        let request = HttpRequest::new(
            HttpMethod::Get,
            "https://example.com",
            RequestAction::UserInfo,
        )
        .header("Accept-API-Version", "resource=2.1")
        .bearer_token("secret")
        .timeout(Duration::from_secs(30));

        assert_eq!(request.url, "https://example.com");
        assert_eq!(request.action, RequestAction::UserInfo);
        assert_eq!(
            request.headers.get("Accept-API-Version"),
            Some(&"resource=2.1".to_string())
        );
        assert!(request.headers.contains_key("Authorization"));
    }

    #[test]
    fn test_form_body_sets_content_type() {
        let request = HttpRequest::new(
            HttpMethod::Post,
            "https://example.com/token",
            RequestAction::ExchangeToken,
        )
        .form("grant_type=authorization_code&code=abc");

        assert_eq!(
            request.headers.get("Content-Type"),
            Some(&"application/x-www-form-urlencoded".to_string())
        );
        assert_eq!(
            request.body.unwrap(),
            Bytes::from("grant_type=authorization_code&code=abc")
        );
    }

    #[test]
    fn test_http_response_status_checks() {
        let response = HttpResponse {
            status: 302,
            headers: HashMap::from([(
                "location".to_string(),
                "https://example.com/cb?code=x".to_string(),
            )]),
            body: Bytes::new(),
        };

        assert!(response.is_redirect());
        assert!(!response.is_success());
        assert_eq!(
            response.header("Location"),
            Some("https://example.com/cb?code=x")
        );
    }

    #[test]
    fn test_action_tag_names() {
        assert_eq!(
            RequestAction::StartAuthenticate.as_str(),
            "START_AUTHENTICATE"
        );
        assert_eq!(RequestAction::ExchangeToken.as_str(), "EXCHANGE_TOKEN");
        assert_eq!(RequestAction::Logout.to_string(), "LOGOUT");
    }
}
