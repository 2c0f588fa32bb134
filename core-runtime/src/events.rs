//! # Event Bus System
//!
//! Provides event-driven notifications for the auth tree client using
//! `tokio::sync::broadcast`. Hosts subscribe to observe authentication and
//! token lifecycle changes without polling storage.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, AuthLifecycleEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Auth(AuthLifecycleEvent::SignedIn {
//!         service: "Login".to_string(),
//!     }))
//!     .ok();
//! ```
//!
//! ## Error Handling
//!
//! The event bus uses `tokio::sync::broadcast`, which can produce two types
//! of errors on the receiving side:
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n`
//!   events. Non-fatal; the subscriber can keep receiving.
//! - **`RecvError::Closed`**: All senders were dropped. Treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Authentication flow and session events
    Auth(AuthLifecycleEvent),
    /// OAuth token lifecycle events
    Token(TokenEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Token(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthLifecycleEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Token(TokenEvent::RefreshFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthLifecycleEvent::SignedIn { .. }) => EventSeverity::Info,
            CoreEvent::Auth(AuthLifecycleEvent::SignedOut) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

/// Events related to tree traversal and the SSO session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthLifecycleEvent {
    /// A tree traversal started.
    FlowStarted {
        /// The auth tree (service) being traversed.
        service: String,
    },
    /// The tree produced another page of callbacks.
    FlowContinued {
        /// The auth tree (service) being traversed.
        service: String,
        /// Stage name supplied by the node, when present.
        stage: Option<String>,
    },
    /// Tree traversal finished with a session token.
    SignedIn {
        /// The auth tree (service) that completed.
        service: String,
    },
    /// The local session was cleared.
    SignedOut,
    /// Tree traversal or session handling failed.
    AuthError {
        /// Human-readable error message.
        message: String,
        /// Whether the caller can retry the flow.
        recoverable: bool,
    },
}

impl AuthLifecycleEvent {
    fn description(&self) -> &str {
        match self {
            AuthLifecycleEvent::FlowStarted { .. } => "Authentication flow started",
            AuthLifecycleEvent::FlowContinued { .. } => "Authentication flow continued",
            AuthLifecycleEvent::SignedIn { .. } => "User signed in successfully",
            AuthLifecycleEvent::SignedOut => "User signed out",
            AuthLifecycleEvent::AuthError { .. } => "Authentication error",
        }
    }
}

/// Events related to OAuth access token lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum TokenEvent {
    /// A new access token was minted from the session.
    Minted {
        /// Timestamp when the token expires (Unix epoch seconds).
        expires_at: i64,
    },
    /// An expired access token was refreshed.
    Refreshed {
        /// Timestamp when the new token expires (Unix epoch seconds).
        expires_at: i64,
    },
    /// Refresh failed; the manager fell back to re-minting.
    RefreshFailed {
        /// Human-readable error message.
        message: String,
    },
    /// Stored tokens were revoked at the server.
    Revoked,
}

impl TokenEvent {
    fn description(&self) -> &str {
        match self {
            TokenEvent::Minted { .. } => "Access token minted",
            TokenEvent::Refreshed { .. } => "Access token refreshed",
            TokenEvent::RefreshFailed { .. } => "Access token refresh failed",
            TokenEvent::Revoked => "Tokens revoked",
        }
    }
}

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// When a subscriber falls behind by more than `capacity` events it
    /// receives `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when there are no active subscribers. Emitting into an empty
    /// bus is not a fault; callers normally discard the result with `.ok()`.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all
    /// future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
