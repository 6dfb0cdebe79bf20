//! core::url
//!
//! Model URLs and server address handling.
//!
//! A model URL names one version of one model in one project:
//!
//! ```text
//! https://<server>/projects/<project>/models/<model>@<version>
//! ```
//!
//! # Example
//!
//! ```
//! use graftwork::core::url::ModelUrl;
//!
//! let url: ModelUrl = "https://app.speckle.systems/projects/f9eeb0be04/models/d3bcf9820c@ca5cde436f"
//!     .parse()
//!     .unwrap();
//!
//! assert_eq!(url.server(), "app.speckle.systems");
//! assert_eq!(url.project().as_str(), "f9eeb0be04");
//! assert_eq!(url.model().as_str(), "d3bcf9820c");
//! assert_eq!(url.version().as_str(), "ca5cde436f");
//! assert_eq!(url.server_url(), "https://app.speckle.systems");
//! ```

use std::str::FromStr;

use thiserror::Error;

use super::types::{ModelName, ProjectId, TypeError, VersionId};

/// Errors parsing a model URL.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("URL format not recognized: {0}")]
    Unrecognized(String),

    #[error("invalid URL component: {0}")]
    Component(#[from] TypeError),
}

/// A parsed model URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUrl {
    secure: bool,
    server: String,
    project: ProjectId,
    model: ModelName,
    version: VersionId,
}

impl ModelUrl {
    /// Parse a model URL.
    ///
    /// # Errors
    ///
    /// Returns `UrlError::Unrecognized` when the URL does not have the
    /// `http(s)://<server>/projects/<p>/models/<m>@<v>` shape, and
    /// `UrlError::Component` when a component fails validation.
    pub fn parse(url: &str) -> Result<Self, UrlError> {
        let unrecognized = || UrlError::Unrecognized(url.to_string());
        let trimmed = url.trim();

        let (secure, rest) = if let Some(rest) = trimmed.strip_prefix("https://") {
            (true, rest)
        } else if let Some(rest) = trimmed.strip_prefix("http://") {
            (false, rest)
        } else {
            return Err(unrecognized());
        };

        let (server, path) = rest.split_once('/').ok_or_else(unrecognized)?;
        if server.is_empty() {
            return Err(unrecognized());
        }

        let path = path.strip_prefix("projects/").ok_or_else(unrecognized)?;
        let (project, path) = path.split_once('/').ok_or_else(unrecognized)?;
        let path = path.strip_prefix("models/").ok_or_else(unrecognized)?;
        let (model, version) = path.split_once('@').ok_or_else(unrecognized)?;
        if project.is_empty() || model.is_empty() || version.is_empty() {
            return Err(unrecognized());
        }

        Ok(Self {
            secure,
            server: server.to_string(),
            project: ProjectId::new(project)?,
            model: ModelName::new(model)?,
            version: VersionId::new(version)?,
        })
    }

    /// Host (and optional port) of the server.
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    pub fn model(&self) -> &ModelName {
        &self.model
    }

    pub fn version(&self) -> &VersionId {
        &self.version
    }

    /// Base URL of the server, with scheme.
    pub fn server_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}", scheme, self.server)
    }

    /// The same model at another version.
    pub fn at_version(&self, version: VersionId) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }
}

impl FromStr for ModelUrl {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ModelUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/projects/{}/models/{}@{}",
            self.server_url(),
            self.project,
            self.model,
            self.version
        )
    }
}

/// Reduce a server address to its bare host form.
///
/// Strips the scheme and trailing slashes, and collapses doubled slashes.
///
/// ```
/// use graftwork::core::url::sanitize_server_url;
///
/// assert_eq!(sanitize_server_url("https://speckle.xyz//"), "speckle.xyz");
/// ```
pub fn sanitize_server_url(url: &str) -> String {
    let url = url.trim();
    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    url.trim_end_matches('/').replace("//", "/")
}
