//! secrets::file_store
//!
//! File-based secret storage.
//!
//! # Security
//!
//! - Secrets live in `~/.graft/secrets.toml`, or `$GRAFT_SECRETS_FILE`
//! - File permissions are set to 0600 on Unix before anything is written
//! - Writes go to a temp file that is renamed over the original
//!
//! # Format
//!
//! ```toml
//! version = 1
//!
//! [entries]
//! "token.app.speckle.systems" = "..."
//! ```

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use serde::{Deserialize, Serialize};

use super::traits::{SecretError, SecretStore};

/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SecretsFile {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// File-based secret storage.
#[derive(Debug)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    /// Create a store at the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, SecretError> {
        if let Ok(path) = std::env::var("GRAFT_SECRETS_FILE") {
            return Ok(Self::with_path(PathBuf::from(path)));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| SecretError::ReadError("cannot determine home directory".into()))?;
        Ok(Self::with_path(home.join(".graft").join("secrets.toml")))
    }

    /// Create a store at a custom path.
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<SecretsFile, SecretError> {
        if !self.path.exists() {
            return Ok(SecretsFile {
                version: FORMAT_VERSION,
                entries: BTreeMap::new(),
            });
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| SecretError::ReadError(format!("cannot read secrets file: {}", e)))?;

        // Parse errors from toml quote the offending line, which may hold a secret.
        let file: SecretsFile = toml::from_str(&content).map_err(|_| {
            SecretError::ReadError(format!("cannot parse {}", self.path.display()))
        })?;

        if file.version > FORMAT_VERSION {
            return Err(SecretError::ReadError(format!(
                "{} uses format version {}, newer than supported {}",
                self.path.display(),
                file.version,
                FORMAT_VERSION
            )));
        }
        Ok(file)
    }

    fn write_file(&self, file: &SecretsFile) -> Result<(), SecretError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SecretError::WriteError(format!("cannot create directory: {}", e)))?;
        }

        let content = toml::to_string_pretty(file)
            .map_err(|_| SecretError::WriteError("cannot serialize secrets".into()))?;

        let temp_path = self.path.with_extension("toml.tmp");
        {
            let mut out = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(|e| SecretError::WriteError(format!("cannot create temp file: {}", e)))?;

            #[cfg(unix)]
            out.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| SecretError::WriteError(format!("cannot set permissions: {}", e)))?;

            out.write_all(content.as_bytes())
                .and_then(|_| out.sync_all())
                .map_err(|e| SecretError::WriteError(format!("cannot write secrets: {}", e)))?;
        }

        fs::rename(&temp_path, &self.path)
            .map_err(|e| SecretError::WriteError(format!("cannot rename temp file: {}", e)))
    }

    /// Whether the file is private to its owner. True when absent.
    #[cfg(unix)]
    pub fn is_private(&self) -> Result<bool, SecretError> {
        match fs::metadata(&self.path) {
            Ok(metadata) => Ok(metadata.permissions().mode() & 0o077 == 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(SecretError::ReadError(format!(
                "cannot read file metadata: {}",
                e
            ))),
        }
    }

    #[cfg(not(unix))]
    pub fn is_private(&self) -> Result<bool, SecretError> {
        Ok(true)
    }
}

fn check_key(key: &str) -> Result<(), SecretError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && !key.ends_with('.')
        && !key.chars().any(|c| c.is_whitespace() || c.is_control());
    if valid {
        Ok(())
    } else {
        Err(SecretError::InvalidKey(key.to_string()))
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
        check_key(key)?;
        Ok(self.read_file()?.entries.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SecretError> {
        check_key(key)?;
        let mut file = self.read_file()?;
        file.version = FORMAT_VERSION;
        file.entries.insert(key.to_string(), value.to_string());
        self.write_file(&file)
    }

    fn delete(&self, key: &str) -> Result<(), SecretError> {
        check_key(key)?;
        let mut file = self.read_file()?;
        if file.entries.remove(key).is_some() {
            self.write_file(&file)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, SecretError> {
        Ok(self.read_file()?.entries.into_keys().collect())
    }
}
