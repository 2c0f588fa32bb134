//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host
//! application embedding the auth client.
//!
//! ## Overview
//!
//! This crate defines the contract between the auth engine and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that must be provided differently per host (desktop,
//! mobile, server-side test harness):
//!
//! - [`HttpClient`](http::HttpClient) - the HTTP transport; the core never
//!   opens sockets itself
//! - [`SecureStore`](storage::SecureStore) - encrypted-at-rest key-value
//!   persistence for tokens
//! - [`Encryptor`](storage::Encryptor) - at-rest encryption seam used by
//!   `SecureStore` implementations, invisible to the core
//! - [`PushTransport`](push::PushTransport) - device push registration token
//!   source for the push-mechanism flow
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing; see the configuration builder in `core-runtime`.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so implementations can be
//! shared across async tasks behind `Arc`.

pub mod error;
pub mod http;
pub mod push;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RequestAction};
pub use push::PushTransport;
pub use storage::{EncryptedSecureStore, Encryptor, SecureStore};
