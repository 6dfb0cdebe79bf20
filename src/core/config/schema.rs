//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$GRAFT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/graft/config.toml`
//! 3. `~/.graft/config.toml` (canonical write location)
//!
//! # Local Config
//!
//! Located at `<dir>/.graft/config.toml`, where `<dir>` is the working
//! directory the command runs in.
//!
//! # Validation
//!
//! Values are validated after parsing: depths are bounded, tokens must be
//! single words and the secrets provider must be known.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::engine::walk::MAX_DEPTH_LIMIT;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// default_server = "app.speckle.systems"
/// max_depth = 10
/// root_token = "Objects.Organization.Model"
/// commit_message = "Bulk property update"
/// source_application = "graft"
///
/// [secrets]
/// provider = "file"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Server used by `graft auth` when no host is given
    pub default_server: Option<String>,

    /// Traversal depth limit
    pub max_depth: Option<usize>,

    /// Type token of the container object excluded from the visited list
    pub root_token: Option<String>,

    /// Default message for new versions
    pub commit_message: Option<String>,

    /// Application name reported when creating versions
    pub source_application: Option<String>,

    /// Secret storage settings
    pub secrets: Option<SecretsConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(server) = &self.default_server {
            if server.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "default_server cannot be empty".to_string(),
                ));
            }
        }

        validate_max_depth(self.max_depth)?;
        validate_root_token(self.root_token.as_deref())?;

        if let Some(app) = &self.source_application {
            if app.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "source_application cannot be empty".to_string(),
                ));
            }
        }

        if let Some(secrets) = &self.secrets {
            secrets.validate()?;
        }

        Ok(())
    }
}

/// Directory-local configuration.
///
/// Overrides the traversal settings of the global config for commands run
/// inside the directory.
///
/// # Example
///
/// ```toml
/// max_depth = 4
/// root_token = "Objects.Organization.Model"
/// commit_message = "Renumber levels"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LocalConfig {
    /// Traversal depth limit
    pub max_depth: Option<usize>,

    /// Type token of the container object excluded from the visited list
    pub root_token: Option<String>,

    /// Default message for new versions
    pub commit_message: Option<String>,
}

impl LocalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_max_depth(self.max_depth)?;
        validate_root_token(self.root_token.as_deref())
    }
}

/// Secrets configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SecretsConfig {
    /// Provider to use
    pub provider: Option<String>,
}

impl SecretsConfig {
    /// Valid secret providers.
    pub const VALID_PROVIDERS: &'static [&'static str] = &["file"];

    /// Validate the secrets configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(provider) = &self.provider {
            if !Self::VALID_PROVIDERS.contains(&provider.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid secrets provider '{}', must be one of: {}",
                    provider,
                    Self::VALID_PROVIDERS.join(", ")
                )));
            }
        }
        Ok(())
    }
}

/// Check a configured depth limit.
pub(crate) fn validate_max_depth(depth: Option<usize>) -> Result<(), ConfigError> {
    match depth {
        Some(d) if d > MAX_DEPTH_LIMIT => Err(ConfigError::InvalidValue(format!(
            "max_depth {} exceeds the limit of {}",
            d, MAX_DEPTH_LIMIT
        ))),
        _ => Ok(()),
    }
}

fn validate_root_token(token: Option<&str>) -> Result<(), ConfigError> {
    if let Some(token) = token {
        if token.is_empty() || token.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ConfigError::InvalidValue(format!(
                "invalid root_token '{}': must be a single non-empty word",
                token
            )));
        }
    }
    Ok(())
}
