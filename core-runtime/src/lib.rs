//! # Core Runtime
//!
//! Runtime wiring for the auth tree client core: configuration, the event
//! bus, and logging setup. The modules above this crate (tree traversal,
//! OAuth, token management) consume a [`config::CoreConfig`] and emit
//! [`events::CoreEvent`]s; hosts build the config once at startup and hand
//! it to the client facade.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, OAuthSettings};
pub use error::{Result, RuntimeError};
pub use events::{AuthLifecycleEvent, CoreEvent, EventBus, EventSeverity, TokenEvent};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
