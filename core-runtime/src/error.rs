//! Runtime error types

use thiserror::Error;

/// Errors raised while wiring up the runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration is invalid or incomplete
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required host capability was not provided
    #[error("Capability missing: {0}")]
    CapabilityMissing(&'static str),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
