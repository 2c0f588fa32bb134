//! Error types for authentication, token, and session operations.

use thiserror::Error;

/// Stage of the flow at which an authentication failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// While traversing the auth tree
    Tree,
    /// While minting or refreshing OAuth tokens
    Token,
    /// While operating on the SSO session
    Session,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureStage::Tree => "tree",
            FailureStage::Token => "token",
            FailureStage::Session => "session",
        };
        f.write_str(s)
    }
}

/// Errors produced by the auth client.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Network or transport failure; the request never produced a usable
    /// response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered, but not with the shape this client expects.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server rejected the authentication attempt.
    #[error("Authentication failed during {stage} ({reason}): {detail}")]
    AuthenticationFailed {
        reason: String,
        stage: FailureStage,
        detail: String,
    },

    /// A login was requested while a valid session already exists.
    #[error("Already authenticated: an active session exists; log out first")]
    AlreadyAuthenticated,

    /// A new flow was requested while another flow is mid-traversal.
    #[error("Authentication in progress: finish or abandon the current flow first")]
    AuthenticationInProgress,

    /// The tree's authId lease expired before the flow completed.
    #[error("Authentication expired: the flow timed out, start over")]
    AuthenticationExpired,

    /// No usable credentials remain; interactive authentication is needed.
    #[error("Authentication required: no valid session or tokens")]
    AuthenticationRequired,

    /// A second-factor mechanism could not be registered on this device.
    #[error("Mechanism creation failed: {0}")]
    MechanismCreationFailed(String),

    /// The secure store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A payload could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The client configuration is unusable for the requested operation.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bridge_traits::BridgeError> for AuthError {
    fn from(err: bridge_traits::BridgeError) -> Self {
        AuthError::Storage(err.to_string())
    }
}

impl From<core_runtime::RuntimeError> for AuthError {
    fn from(err: core_runtime::RuntimeError) -> Self {
        AuthError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
