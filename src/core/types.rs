//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ObjectId`] - Content-derived identifier of a stored object
//! - [`ProjectId`] - Server-side project (stream) identifier
//! - [`ModelName`] - Model (branch) name within a project
//! - [`VersionId`] - Version (commit) identifier
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use graftwork::core::types::{ModelName, ObjectId};
//!
//! let id = ObjectId::new("3f9a0c1de2b4a5c6d7e8f90a1b2c3d4e").unwrap();
//! assert_eq!(id.short(7), "3f9a0c1");
//!
//! assert!(ObjectId::new("").is_err());
//! assert!(ModelName::new("main").is_ok());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Number of hex characters kept from the SHA-256 digest for object ids.
pub const OBJECT_ID_LEN: usize = 32;

/// Errors from type validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("invalid project id: {0}")]
    InvalidProjectId(String),

    #[error("invalid model name: {0}")]
    InvalidModelName(String),

    #[error("invalid version id: {0}")]
    InvalidVersionId(String),
}

/// Shared check for identifier-like strings: non-empty, no whitespace,
/// no control characters.
fn validate_token(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("cannot be empty".into());
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(format!("'{}' contains whitespace or control characters", value));
    }
    Ok(())
}

/// Identifier of a stored object.
///
/// Ids are assigned by the object store and are immutable once set on a
/// node. Ids computed locally by [`ObjectId::for_content`] are the first
/// 32 hex characters of a SHA-256 digest; ids received from a server are
/// accepted as opaque tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidObjectId` for empty ids or ids containing
    /// whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        validate_token(&id).map_err(TypeError::InvalidObjectId)?;
        Ok(Self(id))
    }

    /// Compute the content-derived id for a canonical serialization.
    ///
    /// # Example
    ///
    /// ```
    /// use graftwork::core::types::ObjectId;
    ///
    /// let a = ObjectId::for_content(b"{\"x\":1}");
    /// let b = ObjectId::for_content(b"{\"x\":1}");
    /// assert_eq!(a, b);
    /// assert_eq!(a.as_str().len(), 32);
    /// ```
    pub fn for_content(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut hex = hex::encode(digest);
        hex.truncate(OBJECT_ID_LEN);
        Self(hex)
    }

    /// Get an abbreviated form of the id.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ObjectId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A project (stream) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    /// Create a new validated project id.
    ///
    /// Project ids may not contain `/` since they are embedded in URL paths.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        validate_token(&id).map_err(TypeError::InvalidProjectId)?;
        if id.contains('/') {
            return Err(TypeError::InvalidProjectId(
                "project id cannot contain '/'".into(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the project id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProjectId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ProjectId> for String {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A model (branch) name.
///
/// Model names may contain `/` for nested models but cannot contain `@`,
/// which separates the model from the version in model URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelName(String);

impl ModelName {
    /// Create a new validated model name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TypeError::InvalidModelName(
                "model name cannot be empty".into(),
            ));
        }
        if name.contains('@') {
            return Err(TypeError::InvalidModelName(
                "model name cannot contain '@'".into(),
            ));
        }
        if name.chars().any(|c| c.is_control()) {
            return Err(TypeError::InvalidModelName(
                "model name cannot contain control characters".into(),
            ));
        }
        Ok(Self(name))
    }

    /// Get the model name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ModelName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ModelName> for String {
    fn from(name: ModelName) -> Self {
        name.0
    }
}

impl std::fmt::Display for ModelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A version (commit) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionId(String);

impl VersionId {
    /// Create a new validated version id.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        validate_token(&id).map_err(TypeError::InvalidVersionId)?;
        if id.contains('/') {
            return Err(TypeError::InvalidVersionId(
                "version id cannot contain '/'".into(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the version id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VersionId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<VersionId> for String {
    fn from(id: VersionId) -> Self {
        id.0
    }
}

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
