//! # Core Configuration Module
//!
//! Provides configuration management for the auth tree client core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the server coordinates, OAuth 2.0 client settings, and
//! all host-provided capabilities. It enforces fail-fast validation so that a
//! missing bridge surfaces at build time instead of mid-flow.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - All server traffic goes through it
//! - `SecureStore` - Token persistence
//!
//! ## Optional Dependencies
//!
//! - `PushTransport` - Required only for push mechanism registration
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, OAuthSettings};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .server_url("https://openam.example.com/openam")
//!     .realm("alpha")
//!     .oauth(OAuthSettings::new(
//!         "client-id",
//!         "https://app.example.com/callback",
//!         "openid profile email",
//!     ))
//!     .http_client(Arc::new(MyHttpClient))
//!     .secure_store(Arc::new(MySecureStore))
//!     .build()?;
//! ```

use crate::error::{Result, RuntimeError};
use bridge_traits::{HttpClient, PushTransport, SecureStore};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default session cookie name used by AM deployments.
pub const DEFAULT_COOKIE_NAME: &str = "iPlanetDirectoryPro";

/// Default realm when none is configured.
pub const DEFAULT_REALM: &str = "root";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// OAuth 2.0 client settings.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthSettings {
    /// Registered OAuth 2.0 client identifier
    pub client_id: String,

    /// Redirect URI registered for the client
    pub redirect_uri: String,

    /// Space-separated scope string requested at authorization
    pub scope: String,
}

impl OAuthSettings {
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope: scope.into(),
        }
    }

    /// Validates the settings.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(RuntimeError::Config(
                "OAuth client_id cannot be empty".to_string(),
            ));
        }

        Url::parse(&self.redirect_uri).map_err(|e| {
            RuntimeError::Config(format!(
                "OAuth redirect_uri is not a valid URL: {}",
                e
            ))
        })?;

        if self.scope.is_empty() {
            return Err(RuntimeError::Config(
                "OAuth scope cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for OAuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSettings")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Core configuration for the auth tree client.
///
/// This struct holds all dependencies and settings required to initialize
/// the core library. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL of the AM deployment, e.g. `https://openam.example.com/openam`
    pub server_url: Url,

    /// Realm the client authenticates against
    pub realm: String,

    /// Cookie / header name carrying the SSO session token
    pub cookie_name: String,

    /// Auth tree (service) used for login
    pub auth_service: String,

    /// Auth tree (service) used for registration
    pub registration_service: String,

    /// Request timeout applied to every outbound call
    pub timeout: Duration,

    /// OAuth 2.0 client settings (required for token operations)
    pub oauth: Option<OAuthSettings>,

    /// HTTP client for server traffic (required)
    pub http_client: Arc<dyn HttpClient>,

    /// Secure token storage (required)
    pub secure_store: Arc<dyn SecureStore>,

    /// Push messaging transport (optional, needed for push registration)
    pub push_transport: Option<Arc<dyn PushTransport>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("server_url", &self.server_url.as_str())
            .field("realm", &self.realm)
            .field("cookie_name", &self.cookie_name)
            .field("auth_service", &self.auth_service)
            .field("registration_service", &self.registration_service)
            .field("timeout", &self.timeout)
            .field("oauth", &self.oauth)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field(
                "push_transport",
                &self.push_transport.as_ref().map(|_| "PushTransport { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        match self.server_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(RuntimeError::Config(format!(
                    "Server URL scheme must be http or https, got '{}'",
                    other
                )))
            }
        }

        if self.realm.is_empty() {
            return Err(RuntimeError::Config("Realm cannot be empty".to_string()));
        }

        if self.cookie_name.is_empty() {
            return Err(RuntimeError::Config(
                "Cookie name cannot be empty".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(RuntimeError::Config(
                "Timeout must be greater than zero".to_string(),
            ));
        }

        if let Some(ref oauth) = self.oauth {
            oauth.validate()?;
        }

        Ok(())
    }

    /// OAuth settings, or an error when none were configured.
    pub fn oauth_settings(&self) -> Result<&OAuthSettings> {
        self.oauth.as_ref().ok_or_else(|| {
            RuntimeError::Config(
                "OAuth settings are required for token operations. \
                 Use .oauth() on the builder to provide them."
                    .to_string(),
            )
        })
    }

    fn join(&self, path: &str) -> Url {
        let base = self.server_url.as_str().trim_end_matches('/');
        // Paths are fixed literals plus the validated realm; this cannot fail
        // to parse once the base URL itself validated.
        Url::parse(&format!("{}/{}", base, path)).unwrap_or_else(|_| self.server_url.clone())
    }

    /// Authenticate endpoint for the configured realm, targeting `service`.
    pub fn authenticate_url(&self, service: &str) -> Url {
        let mut url = self.join(&format!("json/realms/{}/authenticate", self.realm));
        url.query_pairs_mut()
            .append_pair("authIndexType", "service")
            .append_pair("authIndexValue", service);
        url
    }

    /// OAuth 2.0 authorization endpoint for the configured realm.
    pub fn authorize_url(&self) -> Url {
        self.join(&format!("oauth2/realms/{}/authorize", self.realm))
    }

    /// OAuth 2.0 token endpoint for the configured realm.
    pub fn token_url(&self) -> Url {
        self.join(&format!("oauth2/realms/{}/access_token", self.realm))
    }

    /// OAuth 2.0 token revocation endpoint for the configured realm.
    pub fn revoke_url(&self) -> Url {
        self.join(&format!("oauth2/realms/{}/token/revoke", self.realm))
    }

    /// OIDC userinfo endpoint for the configured realm.
    pub fn userinfo_url(&self) -> Url {
        self.join(&format!("oauth2/realms/{}/userinfo", self.realm))
    }

    /// Session logout endpoint for the configured realm.
    pub fn session_logout_url(&self) -> Url {
        let mut url = self.join(&format!("json/realms/{}/sessions", self.realm));
        url.query_pairs_mut().append_pair("_action", "logout");
        url
    }
}

fn http_client_missing_error() -> RuntimeError {
    RuntimeError::CapabilityMissing(
        "HttpClient implementation is required for server communication. \
         Inject the host platform's HTTP stack via .http_client().",
    )
}

fn secure_store_missing_error() -> RuntimeError {
    RuntimeError::CapabilityMissing(
        "SecureStore implementation is required for token persistence. \
         Inject platform-native secure storage (Keychain/Keystore) via .secure_store().",
    )
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](CoreConfigBuilder::build) to create the final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    server_url: Option<String>,
    realm: Option<String>,
    cookie_name: Option<String>,
    auth_service: Option<String>,
    registration_service: Option<String>,
    timeout: Option<Duration>,
    oauth: Option<OAuthSettings>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    push_transport: Option<Arc<dyn PushTransport>>,
}

impl CoreConfigBuilder {
    /// Sets the base URL of the AM deployment (required).
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Sets the realm. Default: `"root"`.
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Sets the session cookie name. Default: `"iPlanetDirectoryPro"`.
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = Some(name.into());
        self
    }

    /// Sets the auth tree used for login. Default: `"Login"`.
    pub fn auth_service(mut self, service: impl Into<String>) -> Self {
        self.auth_service = Some(service.into());
        self
    }

    /// Sets the auth tree used for registration. Default: `"Registration"`.
    pub fn registration_service(mut self, service: impl Into<String>) -> Self {
        self.registration_service = Some(service.into());
        self
    }

    /// Sets the request timeout. Default: 30 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the OAuth 2.0 client settings.
    ///
    /// Required for access token minting, refresh, revocation, and userinfo.
    /// Session-only deployments may omit them.
    pub fn oauth(mut self, oauth: OAuthSettings) -> Self {
        self.oauth = Some(oauth);
        self
    }

    /// Sets the HTTP client implementation (required).
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the secure store implementation (required).
    ///
    /// The secure store is used for persisting the SSO session token and
    /// OAuth tokens. It must provide platform-appropriate security
    /// (Keychain on macOS/iOS, Keystore on Android, etc.).
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Sets the push transport implementation (optional).
    ///
    /// Required only when registering push mechanisms.
    pub fn push_transport(mut self, transport: Arc<dyn PushTransport>) -> Self {
        self.push_transport = Some(transport);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The server URL is missing or fails to parse
    /// - Required bridges are missing (HttpClient, SecureStore)
    /// - Configuration values are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let server_url = self.server_url.ok_or_else(|| {
            RuntimeError::Config("Server URL is required. Use .server_url() to set it.".to_string())
        })?;

        let server_url = Url::parse(&server_url)
            .map_err(|e| RuntimeError::Config(format!("Server URL is invalid: {}", e)))?;

        let http_client = self.http_client.ok_or_else(http_client_missing_error)?;
        let secure_store = self.secure_store.ok_or_else(secure_store_missing_error)?;

        let config = CoreConfig {
            server_url,
            realm: self.realm.unwrap_or_else(|| DEFAULT_REALM.to_string()),
            cookie_name: self
                .cookie_name
                .unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string()),
            auth_service: self.auth_service.unwrap_or_else(|| "Login".to_string()),
            registration_service: self
                .registration_service
                .unwrap_or_else(|| "Registration".to_string()),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            oauth: self.oauth,
            http_client,
            secure_store,
            push_transport: self.push_transport,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{BridgeError, HttpRequest, HttpResponse};
    use std::sync::Arc;

    struct MockHttpClient;

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn execute(
            &self,
            _request: HttpRequest,
        ) -> std::result::Result<HttpResponse, BridgeError> {
            Err(BridgeError::NotAvailable("mock".to_string()))
        }
    }

    struct MockSecureStore;

    #[async_trait]
    impl SecureStore for MockSecureStore {
        async fn set(&self, _key: &str, _value: &[u8]) -> std::result::Result<(), BridgeError> {
            Ok(())
        }

        async fn get(&self, _key: &str) -> std::result::Result<Option<Vec<u8>>, BridgeError> {
            Ok(None)
        }

        async fn delete(&self, _key: &str) -> std::result::Result<(), BridgeError> {
            Ok(())
        }
    }

    fn base_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .server_url("https://openam.example.com/openam")
            .http_client(Arc::new(MockHttpClient))
            .secure_store(Arc::new(MockSecureStore))
    }

    #[test]
    fn test_builder_requires_server_url() {
        let result = CoreConfig::builder()
            .http_client(Arc::new(MockHttpClient))
            .secure_store(Arc::new(MockSecureStore))
            .build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Server URL is required"));
    }

    #[test]
    fn test_builder_requires_http_client() {
        let result = CoreConfig::builder()
            .server_url("https://openam.example.com/openam")
            .secure_store(Arc::new(MockSecureStore))
            .build();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("HttpClient"));
    }

    #[test]
    fn test_builder_requires_secure_store() {
        let result = CoreConfig::builder()
            .server_url("https://openam.example.com/openam")
            .http_client(Arc::new(MockHttpClient))
            .build();

        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("SecureStore"));
        assert!(err_msg.contains("token persistence"));
    }

    #[test]
    fn test_builder_defaults() {
        let config = base_builder().build().unwrap();

        assert_eq!(config.realm, "root");
        assert_eq!(config.cookie_name, "iPlanetDirectoryPro");
        assert_eq!(config.auth_service, "Login");
        assert_eq!(config.registration_service, "Registration");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.oauth.is_none());
    }

    #[test]
    fn test_builder_rejects_invalid_server_url() {
        let result = CoreConfig::builder()
            .server_url("not a url")
            .http_client(Arc::new(MockHttpClient))
            .secure_store(Arc::new(MockSecureStore))
            .build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Server URL is invalid"));
    }

    #[test]
    fn test_builder_rejects_empty_oauth_client_id() {
        let result = base_builder()
            .oauth(OAuthSettings::new(
                "",
                "https://app.example.com/callback",
                "openid",
            ))
            .build();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("client_id"));
    }

    #[test]
    fn test_builder_rejects_bad_redirect_uri() {
        let result = base_builder()
            .oauth(OAuthSettings::new("client", "::bad::", "openid"))
            .build();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("redirect_uri"));
    }

    #[test]
    fn test_authenticate_url_targets_service() {
        let config = base_builder().realm("alpha").build().unwrap();

        let url = config.authenticate_url("Login");
        assert_eq!(
            url.as_str(),
            "https://openam.example.com/openam/json/realms/alpha/authenticate\
             ?authIndexType=service&authIndexValue=Login"
        );
    }

    #[test]
    fn test_oauth_and_session_urls() {
        let config = base_builder().build().unwrap();

        assert_eq!(
            config.authorize_url().as_str(),
            "https://openam.example.com/openam/oauth2/realms/root/authorize"
        );
        assert_eq!(
            config.token_url().as_str(),
            "https://openam.example.com/openam/oauth2/realms/root/access_token"
        );
        assert_eq!(
            config.revoke_url().as_str(),
            "https://openam.example.com/openam/oauth2/realms/root/token/revoke"
        );
        assert_eq!(
            config.userinfo_url().as_str(),
            "https://openam.example.com/openam/oauth2/realms/root/userinfo"
        );
        assert_eq!(
            config.session_logout_url().as_str(),
            "https://openam.example.com/openam/json/realms/root/sessions?_action=logout"
        );
    }

    #[test]
    fn test_trailing_slash_on_server_url_is_tolerated() {
        let config = CoreConfig::builder()
            .server_url("https://openam.example.com/openam/")
            .http_client(Arc::new(MockHttpClient))
            .secure_store(Arc::new(MockSecureStore))
            .build()
            .unwrap();

        assert_eq!(
            config.authorize_url().as_str(),
            "https://openam.example.com/openam/oauth2/realms/root/authorize"
        );
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = base_builder().build().unwrap();
        let cloned = config.clone();
        assert_eq!(cloned.realm, config.realm);
        assert_eq!(cloned.server_url, config.server_url);
    }
}
