//! remote
//!
//! Abstraction for the server that stores object graphs and versions.
//!
//! # Architecture
//!
//! The `Remote` trait defines the interface to the object store. Commands
//! use [`for_model_url`] rather than naming an implementation directly, and
//! tests substitute [`mock::MockRemote`].
//!
//! # Modules
//!
//! - `traits`: Core `Remote` trait and request/response types
//! - [`speckle`]: Speckle-compatible server over GraphQL and REST
//! - [`mock`]: Mock implementation for deterministic testing
//!
//! # Example
//!
//! ```ignore
//! use graftwork::core::url::ModelUrl;
//! use graftwork::remote::{for_model_url, Remote};
//!
//! let url: ModelUrl = "https://app.speckle.systems/projects/p/models/m@v".parse()?;
//! let remote = for_model_url(&url, token);
//! let version = remote.version(url.project(), url.version()).await?;
//! ```

pub mod mock;
pub mod speckle;
mod traits;

pub use traits::*;

use crate::core::url::ModelUrl;

/// Create the remote that serves `url`, keeping its scheme and port.
pub fn for_model_url(url: &ModelUrl, token: Option<String>) -> speckle::SpeckleRemote {
    speckle::SpeckleRemote::with_base_url(url.server_url(), token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_plain_http_and_port() {
        let url = ModelUrl::parse("http://localhost:3000/projects/p/models/m@v").unwrap();
        let remote = for_model_url(&url, Some("t".into()));
        assert_eq!(remote.base_url(), "http://localhost:3000");
        assert_eq!(remote.name(), "speckle");
    }
}
