//! Durable key-value boundary used by the reactive store.
//!
//! # Responsibility
//! - Define the `get`/`set`/`clear` contract every slot backend satisfies.
//! - Provide in-memory and SQLite-backed implementations.
//!
//! # Invariants
//! - `set` is all-or-nothing: on error the previous entry is left untouched.
//! - Values are opaque UTF-8 strings; the store owns JSON encoding.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod memory;
mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

pub type StorageResult<T> = Result<T, StorageError>;

/// Failure reported by a storage backend.
#[derive(Debug)]
pub enum StorageError {
    /// Backend database failure.
    Db(DbError),
    /// The write would exceed the backend's capacity.
    QuotaExceeded {
        key: String,
        required_bytes: usize,
        quota_bytes: usize,
    },
    /// Backend is unusable (e.g. a poisoned connection lock).
    Unavailable(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::QuotaExceeded {
                key,
                required_bytes,
                quota_bytes,
            } => write!(
                f,
                "storage quota exceeded writing `{key}`: {required_bytes} bytes needed, quota is {quota_bytes}"
            ),
            Self::Unavailable(details) => write!(f, "storage unavailable: {details}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Key-value storage scoped to one vault.
///
/// Implementations must be usable from any thread; the store serializes
/// writes per key before calling `set`.
pub trait KeyValueStorage: Send + Sync {
    /// Returns the raw entry for `key`, or `None` when absent.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    /// Replaces the entry for `key`.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    /// Removes every entry.
    fn clear(&self) -> StorageResult<()>;
}
