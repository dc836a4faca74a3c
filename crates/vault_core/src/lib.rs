//! Core domain logic for the vault.
//! This crate is the single source of truth for persistence and record
//! invariants; shells call into it through `vault_ffi` or `vault_cli`.

pub mod config;
pub mod db;
pub mod lock;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod share;
pub mod storage;
pub mod store;
pub mod sync;
pub mod vault;

pub use config::{ConfigError, StorageKind, VaultConfig};
pub use lock::{LockError, PinLock};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::list::{ListItem, ShoppingList};
pub use model::note::Note;
pub use model::password::PasswordEntry;
pub use model::reminder::Reminder;
pub use model::{Record, RecordKind};
pub use repo::{RecordCollection, RepoError};
pub use service::{ServiceError, ServiceResult};
pub use share::{decode_import, DecodeError, ExportOptions, ImportPayload, ShareFormat, VaultExport};
pub use storage::{KeyValueStorage, MemoryStorage, SqliteStorage, StorageError};
pub use store::{Binding, SetValue, Store, StoreError, Subscription};
pub use vault::{ImportSummary, Vault, VaultError, VaultResult, VaultSync};

/// Minimal health-check API for shell integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
