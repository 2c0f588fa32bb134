//! Secure Storage Abstraction
//!
//! Token material never touches disk through the core directly. Hosts supply
//! a [`SecureStore`] backed by the platform keychain or an equivalent, and
//! may layer content encryption on top with [`EncryptedSecureStore`].

use async_trait::async_trait;

use crate::error::{BridgeError, Result};

/// Secure key-value storage for token material.
///
/// Keys are callee-namespaced strings. A missing key is an `Ok(None)` read,
/// never an error; deleting a missing key is a no-op.
///
/// Implementations must be safe for concurrent use from multiple tasks and
/// must make writes visible to subsequent reads from any instance sharing
/// the same backing store.
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a value under a key, replacing any existing value.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve the value for a key, or `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove a key. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Symmetric content encryption applied to stored values.
///
/// The store sees only ciphertext; key management is the host's concern.
pub trait Encryptor: Send + Sync {
    /// Encrypt plaintext bytes.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt ciphertext bytes produced by [`Encryptor::encrypt`].
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// A [`SecureStore`] wrapper that encrypts values before they reach the
/// underlying store and decrypts them on the way out.
///
/// A value that fails to decrypt is treated as corrupt: it is deleted and
/// the read fails, so the caller falls back to re-authentication rather
/// than looping on the same bad ciphertext.
pub struct EncryptedSecureStore<S> {
    inner: S,
    encryptor: Box<dyn Encryptor>,
}

impl<S: SecureStore> EncryptedSecureStore<S> {
    pub fn new(inner: S, encryptor: Box<dyn Encryptor>) -> Self {
        Self { inner, encryptor }
    }
}

#[async_trait]
impl<S: SecureStore> SecureStore for EncryptedSecureStore<S> {
    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let ciphertext = self.encryptor.encrypt(value)?;
        self.inner.set(key, &ciphertext).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let Some(ciphertext) = self.inner.get(key).await? else {
            return Ok(None);
        };
        match self.encryptor.decrypt(&ciphertext) {
            Ok(plaintext) => Ok(Some(plaintext)),
            Err(_) => {
                self.inner.delete(key).await?;
                Err(BridgeError::OperationFailed(format!(
                    "stored value for '{}' failed to decrypt and was removed",
                    key
                )))
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }
}
