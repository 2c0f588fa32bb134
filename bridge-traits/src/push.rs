//! Push Transport Abstraction
//!
//! Push mechanism registration needs the device's messaging token and a way
//! to confirm the transport is usable. Both come from the host platform, so
//! the core only sees this trait.

use async_trait::async_trait;

use crate::error::Result;

/// Host-provided access to the platform push messaging service.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// The device registration token for the messaging service, or `None`
    /// when the device has not been issued one.
    async fn device_token(&self) -> Result<Option<String>>;

    /// Whether the messaging service is available on this device at all.
    fn is_available(&self) -> bool;
}
