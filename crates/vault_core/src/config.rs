//! Vault configuration loaded from TOML.
//!
//! # Responsibility
//! - Describe where vault data lives and which storage backend holds it.
//! - Validate settings before any storage is opened.
//!
//! # Invariants
//! - A missing config file is not an error; defaults apply.
//! - `quota_bytes` only applies to the in-memory backend.

use crate::logging::normalize_level;
use crate::storage::{KeyValueStorage, MemoryStorage, SqliteStorage, StorageError};
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_CONFIG_FILE: &str = "vault.toml";
const DEFAULT_DATA_DIR: &str = ".vault";
const DEFAULT_DB_FILE_NAME: &str = "vault.sqlite3";
const LOG_DIR_NAME: &str = "logs";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    /// Settings parsed but are not usable.
    Invalid(String),
    Storage(StorageError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "config io error at `{}`: {source}", path.display()),
            Self::Parse(err) => write!(f, "config parse error: {err}"),
            Self::Serialize(err) => write!(f, "config serialize error: {err}"),
            Self::Invalid(details) => write!(f, "invalid config: {details}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Serialize(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialize(value)
    }
}

impl From<StorageError> for ConfigError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// Storage backend holding the vault's slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Process-local map; nothing survives a restart.
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub storage: StorageKind,
    pub db_file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_bytes: Option<usize>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            log_level: crate::logging::default_log_level().to_string(),
            storage: StorageKind::default(),
            db_file_name: DEFAULT_DB_FILE_NAME.to_string(),
            quota_bytes: None,
        }
    }
}

impl VaultConfig {
    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, or `vault.toml` in the working directory when `None`.
    ///
    /// Returns defaults when the file does not exist.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Writes this config as TOML, refusing to overwrite unless `force`.
    pub fn write(&self, path: &Path, force: bool) -> ConfigResult<()> {
        if path.exists() && !force {
            return Err(ConfigError::Invalid(format!(
                "config already exists at {}",
                path.display()
            )));
        }
        self.validate()?;
        let contents = self.to_toml_string()?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        normalize_level(&self.log_level).map_err(|err| ConfigError::Invalid(err.to_string()))?;

        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data_dir cannot be empty".to_string()));
        }

        let file_name = self.db_file_name.trim();
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "db_file_name must be a bare file name, got `{}`",
                self.db_file_name
            )));
        }

        match (self.storage, self.quota_bytes) {
            (_, Some(0)) => Err(ConfigError::Invalid(
                "quota_bytes must be greater than zero".to_string(),
            )),
            (StorageKind::Sqlite, Some(_)) => Err(ConfigError::Invalid(
                "quota_bytes only applies to memory storage".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(self.db_file_name.trim())
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOG_DIR_NAME)
    }

    /// Opens the configured backend, creating `data_dir` when needed.
    pub fn open_storage(&self) -> ConfigResult<Arc<dyn KeyValueStorage>> {
        self.validate()?;
        let storage: Arc<dyn KeyValueStorage> = match self.storage {
            StorageKind::Memory => Arc::new(match self.quota_bytes {
                Some(quota) => MemoryStorage::with_quota(quota),
                None => MemoryStorage::new(),
            }),
            StorageKind::Sqlite => {
                std::fs::create_dir_all(&self.data_dir).map_err(|source| ConfigError::Io {
                    path: self.data_dir.clone(),
                    source,
                })?;
                Arc::new(SqliteStorage::open(self.db_path())?)
            }
        };

        info!(
            "event=storage_open module=config status=ok backend={:?}",
            self.storage
        );
        Ok(storage)
    }
}
