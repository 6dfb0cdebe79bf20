//! remote::traits
//!
//! Remote trait definition for the server that stores object graphs and
//! their versions.
//!
//! # Design
//!
//! The `Remote` trait is async because every operation involves network I/O.
//! It moves plain data only (JSON objects, ids, metadata); building the
//! in-memory graph from downloaded objects is the codec's job, so nothing
//! here has to share node handles across threads.
//!
//! # Example
//!
//! ```ignore
//! use graftwork::remote::{Remote, RemoteError};
//! use graftwork::core::types::{ProjectId, VersionId};
//!
//! async fn source_object(remote: &dyn Remote, p: &ProjectId, v: &VersionId) -> Result<(), RemoteError> {
//!     let user = remote.active_user().await?;
//!     let version = remote.version(p, v).await?;
//!     println!("{} reads {}", user.name, version.referenced_object);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::core::codec::{EncodedGraph, ObjectTable};
use crate::core::types::{ModelName, ObjectId, ProjectId, VersionId};

/// Errors from remote operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// No token is available.
    #[error("authentication required")]
    AuthRequired,

    /// The token was rejected.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The token is valid but lacks access to the resource.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// The server returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the server
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The server answered with something unexpected.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// A hint for the user, for errors that have an obvious remedy.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            RemoteError::AuthRequired => Some("run 'graft auth' or set SPECKLE_TOKEN"),
            RemoteError::AuthFailed(_) => Some("check the token and its scopes"),
            RemoteError::PermissionDenied(_) => Some("the token has no access to this project"),
            _ => None,
        }
    }
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

/// A project (stream) the user can see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
    pub id: ProjectId,
    pub name: String,
    /// The user's role, when the server reports it
    pub role: Option<String>,
}

/// A version (commit) of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub id: VersionId,
    /// Root object of the version's graph
    pub referenced_object: ObjectId,
    pub message: Option<String>,
    /// Model the version belongs to, when the server reports it
    pub model: Option<String>,
}

/// Request to create a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVersionRequest {
    pub project: ProjectId,
    pub model: ModelName,
    /// Root object of the new version
    pub object: ObjectId,
    pub message: String,
    pub source_application: String,
    /// Descendant count of the root object
    pub total_children: usize,
    /// Version the new one was derived from
    pub parent: Option<VersionId>,
}

/// Object graph server.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait Remote: Send + Sync {
    /// Implementation name (e.g., "speckle", "mock").
    fn name(&self) -> &'static str;

    /// The user the token belongs to.
    ///
    /// # Errors
    ///
    /// - `AuthRequired` if no token is configured
    /// - `AuthFailed` if the token is rejected
    async fn active_user(&self) -> Result<UserInfo, RemoteError>;

    /// Project details. Doubles as an access check.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the project does not exist
    /// - `PermissionDenied` if the user cannot access it
    async fn project(&self, project: &ProjectId) -> Result<ProjectInfo, RemoteError>;

    /// Version details, including the root object id.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the version does not exist in the project
    async fn version(
        &self,
        project: &ProjectId,
        version: &VersionId,
    ) -> Result<VersionInfo, RemoteError>;

    /// Every object of the graph rooted at `root`, the root included.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the root object does not exist
    async fn download_objects(
        &self,
        project: &ProjectId,
        root: &ObjectId,
    ) -> Result<ObjectTable, RemoteError>;

    /// Store an encoded graph and return its root id.
    async fn upload_objects(
        &self,
        project: &ProjectId,
        graph: &EncodedGraph,
    ) -> Result<ObjectId, RemoteError>;

    /// Create a version pointing at an uploaded root object.
    async fn create_version(
        &self,
        request: CreateVersionRequest,
    ) -> Result<VersionId, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_carry_hints() {
        assert!(RemoteError::AuthRequired.hint().is_some());
        assert!(RemoteError::AuthFailed("expired".into()).hint().is_some());
        assert!(RemoteError::NotFound("x".into()).hint().is_none());
    }

    #[test]
    fn api_error_display() {
        let err = RemoteError::ApiError {
            status: 502,
            message: "bad gateway".into(),
        };
        assert_eq!(err.to_string(), "API error: 502 - bad gateway");
    }
}
