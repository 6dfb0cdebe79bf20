//! secrets
//!
//! Secret storage and token resolution.
//!
//! # Architecture
//!
//! Tokens are stored through the `SecretStore` trait. The only provider is
//! [`FileSecretStore`], which keeps them in `~/.graft/secrets.toml`.
//!
//! A token for a server is looked up in this order:
//! 1. An explicit token (the `--token` flag)
//! 2. The `SPECKLE_TOKEN` environment variable
//! 3. The store entry `token.<host>`
//!
//! # Security
//!
//! - Secrets are never logged or included in error messages
//! - The file store uses 0600 permissions on Unix
//! - All writes are atomic (temp file + rename)
//!
//! # Example
//!
//! ```ignore
//! use graftwork::secrets::{create_store, resolve_token};
//!
//! let store = create_store("file")?;
//! if let Some(found) = resolve_token(None, store.as_ref(), "app.speckle.systems")? {
//!     println!("using token from {}", found.source);
//! }
//! ```

mod file_store;
mod traits;

pub use file_store::FileSecretStore;
pub use traits::{SecretError, SecretStore};

use crate::core::url::sanitize_server_url;

/// The default secret store provider name.
pub const DEFAULT_PROVIDER: &str = "file";

/// Environment variable consulted before the store.
pub const TOKEN_ENV: &str = "SPECKLE_TOKEN";

/// Create a secret store based on the provider name.
///
/// # Errors
///
/// Returns `ProviderNotAvailable` for unknown providers, or the store's own
/// initialization error.
pub fn create_store(provider: &str) -> Result<Box<dyn SecretStore>, SecretError> {
    match provider {
        "file" => Ok(Box::new(FileSecretStore::new()?)),
        other => Err(SecretError::ProviderNotAvailable(format!(
            "unknown secret provider: '{}' (valid: file)",
            other
        ))),
    }
}

/// Store key for a server's token.
///
/// ```
/// use graftwork::secrets::token_key;
///
/// assert_eq!(token_key("https://app.speckle.systems/"), "token.app.speckle.systems");
/// ```
pub fn token_key(server: &str) -> String {
    format!("token.{}", sanitize_server_url(server))
}

/// Where a token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Flag,
    Environment,
    Store,
}

impl std::fmt::Display for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::Flag => write!(f, "--token"),
            TokenSource::Environment => write!(f, "{}", TOKEN_ENV),
            TokenSource::Store => write!(f, "secret store"),
        }
    }
}

/// A resolved token. `Debug` never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    pub token: String,
    pub source: TokenSource,
}

impl std::fmt::Debug for ResolvedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedToken")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Find the token for `server`. Blank values are skipped.
pub fn resolve_token(
    explicit: Option<&str>,
    store: &dyn SecretStore,
    server: &str,
) -> Result<Option<ResolvedToken>, SecretError> {
    let env = std::env::var(TOKEN_ENV).ok();
    resolve_token_from(explicit, env.as_deref(), store, server)
}

fn resolve_token_from(
    explicit: Option<&str>,
    env: Option<&str>,
    store: &dyn SecretStore,
    server: &str,
) -> Result<Option<ResolvedToken>, SecretError> {
    let found = |token: &str, source| {
        Some(ResolvedToken {
            token: token.trim().to_string(),
            source,
        })
    };

    if let Some(token) = explicit.filter(|t| !t.trim().is_empty()) {
        return Ok(found(token, TokenSource::Flag));
    }
    if let Some(token) = env.filter(|t| !t.trim().is_empty()) {
        return Ok(found(token, TokenSource::Environment));
    }
    match store.get(&token_key(server))? {
        Some(token) if !token.trim().is_empty() => Ok(found(&token, TokenSource::Store)),
        _ => Ok(None),
    }
}
