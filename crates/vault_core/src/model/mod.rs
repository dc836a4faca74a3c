//! Vault record model.
//!
//! # Responsibility
//! - Define the record kinds persisted by the vault and their slot keys.
//! - Keep date fields as RFC 3339 strings at the storage boundary and expose
//!   explicit parse helpers for re-hydration.
//!
//! # Invariants
//! - Every record kind lives in exactly one slot, as a JSON array.
//! - Record ids are opaque strings; new ids are UUID v4.
//! - Optional fields are omitted on write and defaulted on read.

use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod list;
pub mod note;
pub mod password;
pub mod reminder;
pub mod settings;
pub mod timestamp;

/// Record kinds stored by the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Note,
    List,
    Password,
    Reminder,
}

impl RecordKind {
    /// Slot key holding every record of this kind.
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Note => "notes",
            Self::List => "lists",
            Self::Password => "passwords",
            Self::Reminder => "reminders",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::List => "list",
            Self::Password => "password",
            Self::Reminder => "reminder",
        }
    }
}

/// Common surface of records kept in a collection slot.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: RecordKind;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}
