//! secrets::traits
//!
//! Secret storage trait definition.
//!
//! # Design
//!
//! `SecretStore` is a small key-value interface. Keys are namespaced
//! (`token.<host>`) so one store can hold tokens for several servers.
//!
//! # Security
//!
//! Implementations must never log, print, or include secret values in
//! error messages, and must be thread-safe.

use thiserror::Error;

/// Errors from secret storage operations.
///
/// Messages name keys and paths, never values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecretError {
    /// Failed to read from secret storage.
    #[error("failed to read secret: {0}")]
    ReadError(String),

    /// Failed to write to secret storage.
    #[error("failed to write secret: {0}")]
    WriteError(String),

    /// Provider not available or not configured.
    #[error("secret provider not available: {0}")]
    ProviderNotAvailable(String),

    /// Key is not a valid namespaced key.
    #[error("invalid secret key: '{0}'")]
    InvalidKey(String),
}

/// Trait for secret storage providers.
pub trait SecretStore: Send + Sync {
    /// Get a secret by key. `Ok(None)` when absent.
    fn get(&self, key: &str) -> Result<Option<String>, SecretError>;

    /// Set a secret, replacing any existing value.
    fn set(&self, key: &str, value: &str) -> Result<(), SecretError>;

    /// Delete a secret. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), SecretError>;

    /// Check if a secret exists.
    fn exists(&self, key: &str) -> Result<bool, SecretError> {
        Ok(self.get(key)?.is_some())
    }

    /// All stored keys, sorted.
    fn keys(&self) -> Result<Vec<String>, SecretError>;
}
