//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! Graft has two configuration scopes:
//! - **Global**: User-level settings
//! - **Local**: Overrides for commands run inside one directory
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Local config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$GRAFT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/graft/config.toml`
//! 3. `~/.graft/config.toml` (canonical write location)
//!
//! # Local Config Location
//!
//! `<dir>/.graft/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use graftwork::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("/path/to/project"))).unwrap();
//! let config = result.config;
//!
//! println!("Depth limit: {}", config.max_depth());
//! if let Some(token) = config.root_token() {
//!     println!("Root token: {}", token);
//! }
//! ```

pub mod schema;

pub use schema::{GlobalConfig, LocalConfig, SecretsConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::engine::walk::DEFAULT_MAX_DEPTH;

/// Application name reported to the server when none is configured.
pub const DEFAULT_SOURCE_APPLICATION: &str = "graft";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Merged configuration from all sources.
///
/// Accessor methods apply precedence: local config overrides global config,
/// and unset values fall back to defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Local configuration (if present)
    pub local: Option<LocalConfig>,
    global_path: Option<PathBuf>,
    local_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `dir` is provided, also loads `<dir>/.graft/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or hold
    /// invalid values. Missing config files are not an error.
    pub fn load(dir: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let global_path = Self::find_global();
        Self::load_from(global_path.as_deref(), dir)
    }

    /// Load configuration from an explicit global file and local directory.
    pub fn load_from(
        global_path: Option<&Path>,
        dir: Option<&Path>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let (global, global_path) = match global_path {
            Some(path) if path.exists() => (Self::read_config(path)?, Some(path.to_path_buf())),
            _ => (GlobalConfig::default(), None),
        };

        let (local, local_path) = match dir {
            Some(dir) => {
                let path = Self::local_config_path(dir);
                if path.exists() {
                    (Some(Self::read_config::<LocalConfig>(&path)?), Some(path))
                } else {
                    (None, None)
                }
            }
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref l) = local {
            l.validate()?;
        }

        if let (Some(g), Some(l)) = (&global_path, &local_path) {
            if g == l {
                warnings.push(ConfigWarning {
                    message: "global and local config are the same file".to_string(),
                    path: l.clone(),
                });
            }
        }

        Ok(ConfigLoadResult {
            config: Config {
                global,
                local,
                global_path,
                local_path,
            },
            warnings,
        })
    }

    /// Locate the global config file, if one exists.
    fn find_global() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("GRAFT_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("graft/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".graft/config.toml"))
            .filter(|path| path.exists())
    }

    fn read_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the canonical path for global config.
    ///
    /// Returns `$GRAFT_CONFIG` when set, otherwise `~/.graft/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var("GRAFT_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".graft/config.toml"))
    }

    /// Get the path for local config in `dir`.
    pub fn local_config_path(dir: &Path) -> PathBuf {
        dir.join(".graft/config.toml")
    }

    /// Write global config atomically.
    pub fn write_global(config: &GlobalConfig) -> Result<PathBuf, ConfigError> {
        let path = Self::global_config_path()?;
        Self::write_config_atomic(&path, config)?;
        Ok(path)
    }

    /// Write local config atomically.
    pub fn write_local(dir: &Path, config: &LocalConfig) -> Result<PathBuf, ConfigError> {
        let path = Self::local_config_path(dir);
        Self::write_config_atomic(&path, config)?;
        Ok(path)
    }

    /// Write a config file atomically (temp file, then rename).
    pub fn write_config_atomic<T: serde::Serialize>(
        path: &Path,
        config: &T,
    ) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Traversal depth limit.
    ///
    /// Defaults to 10 if not configured.
    pub fn max_depth(&self) -> usize {
        self.local
            .as_ref()
            .and_then(|l| l.max_depth)
            .or(self.global.max_depth)
            .unwrap_or(DEFAULT_MAX_DEPTH)
    }

    /// Root container type token, if configured.
    pub fn root_token(&self) -> Option<&str> {
        self.local
            .as_ref()
            .and_then(|l| l.root_token.as_deref())
            .or(self.global.root_token.as_deref())
    }

    /// Message for new versions, if configured.
    pub fn commit_message(&self) -> Option<&str> {
        self.local
            .as_ref()
            .and_then(|l| l.commit_message.as_deref())
            .or(self.global.commit_message.as_deref())
    }

    /// Server used when no host is given.
    pub fn default_server(&self) -> Option<&str> {
        self.global.default_server.as_deref()
    }

    /// Application name reported when creating versions.
    ///
    /// Defaults to "graft".
    pub fn source_application(&self) -> &str {
        self.global
            .source_application
            .as_deref()
            .unwrap_or(DEFAULT_SOURCE_APPLICATION)
    }

    /// Get the secrets provider.
    ///
    /// Defaults to "file" if not configured.
    pub fn secrets_provider(&self) -> &str {
        self.global
            .secrets
            .as_ref()
            .and_then(|s| s.provider.as_deref())
            .unwrap_or("file")
    }

    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    pub fn local_config_loaded_from(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_empty_defaults() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");

        let result = Config::load_from(Some(&missing), Some(temp.path())).unwrap();
        let config = result.config;

        assert_eq!(config.max_depth(), DEFAULT_MAX_DEPTH);
        assert!(config.root_token().is_none());
        assert!(config.commit_message().is_none());
        assert_eq!(config.source_application(), "graft");
        assert_eq!(config.secrets_provider(), "file");
        assert!(config.global_config_loaded_from().is_none());
        assert!(config.local_config_loaded_from().is_none());
    }

    #[test]
    fn load_global_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
            default_server = "speckle.example.com"
            max_depth = 3
            root_token = "Objects.Organization.Model"
            "#,
        )
        .unwrap();

        let config = Config::load_from(Some(&path), None).unwrap().config;

        assert_eq!(config.default_server(), Some("speckle.example.com"));
        assert_eq!(config.max_depth(), 3);
        assert_eq!(config.root_token(), Some("Objects.Organization.Model"));
        assert_eq!(config.global_config_loaded_from(), Some(path.as_path()));
    }

    #[test]
    fn local_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("global.toml");
        fs::write(&global, "max_depth = 3\ncommit_message = \"global\"\n").unwrap();

        let local = LocalConfig {
            max_depth: Some(7),
            ..Default::default()
        };
        Config::write_local(temp.path(), &local).unwrap();

        let config = Config::load_from(Some(&global), Some(temp.path()))
            .unwrap()
            .config;

        assert_eq!(config.max_depth(), 7);
        assert_eq!(config.commit_message(), Some("global"));
    }

    #[test]
    fn write_is_atomic_and_reloadable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.toml");
        let config = GlobalConfig {
            source_application: Some("bulk-tool".to_string()),
            ..Default::default()
        };

        Config::write_config_atomic(&path, &config).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());
        let loaded = Config::load_from(Some(&path), None).unwrap().config;
        assert_eq!(loaded.source_application(), "bulk-tool");
    }

    #[test]
    fn invalid_depth_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".graft");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.toml"), "max_depth = 100000").unwrap();

        assert!(Config::load_from(None, Some(temp.path())).is_err());
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
            max_depth = 2
            unknown_field = true
            "#,
        )
        .unwrap();

        let result = Config::load_from(Some(&path), None);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
