//! Persistent reactive store.
//!
//! # Responsibility
//! - Bind typed in-memory values to durable slots in a `KeyValueStorage`.
//! - Keep every binding of one key in a process on the same value.
//! - Persist every update synchronously with the update itself.
//!
//! # Invariants
//! - A slot is read from storage at most once per `Store` (or on `reload`).
//! - `open` never writes; defaults are not persisted implicitly.
//! - Writes to one key are applied in call order by a single writer.
//! - A corrupt or absent entry yields the binding's fallback, never an error.

use crate::storage::{KeyValueStorage, MemoryStorage, StorageError};
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

mod binding;
mod slot;

pub use binding::{Binding, SetValue, Subscription};
use slot::Slot;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level failure.
///
/// Decode failures never appear here: they are recovered by falling back.
#[derive(Debug)]
pub enum StoreError {
    /// Slot keys must be non-blank.
    InvalidKey(String),
    /// The next value could not be encoded as JSON; nothing changed.
    Encode {
        key: String,
        source: serde_json::Error,
    },
    /// In-memory state was updated but the durable write failed.
    Persist { key: String, source: StorageError },
    /// Storage failed outside of a slot write (clear/reload).
    Storage(StorageError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKey(key) => write!(f, "invalid slot key: `{key}`"),
            Self::Encode { key, source } => write!(f, "failed to encode `{key}`: {source}"),
            Self::Persist { key, source } => write!(f, "failed to persist `{key}`: {source}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidKey(_) => None,
            Self::Encode { source, .. } => Some(source),
            Self::Persist { source, .. } => Some(source),
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// Shared handle over one storage backend and its per-key slot cache.
///
/// Cloning is cheap; clones share slots, so bindings opened from any clone
/// observe each other's writes.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    storage: Arc<dyn KeyValueStorage>,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

impl Store {
    /// Creates a store over an injected storage backend.
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                storage,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Creates a store over fresh process-local storage.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Returns the underlying storage backend.
    pub fn storage(&self) -> Arc<dyn KeyValueStorage> {
        Arc::clone(&self.inner.storage)
    }

    /// Opens a binding to `key`, using `fallback` while the slot has no
    /// decodable entry.
    ///
    /// # Errors
    /// - `InvalidKey` when `key` is blank.
    pub fn open<T>(&self, key: &str, fallback: T) -> StoreResult<Binding<T>>
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        let slot = self.slot(key)?;
        Ok(Binding::new(slot, Arc::clone(&self.inner.storage), fallback))
    }

    /// Re-reads `key` from storage and notifies subscribers.
    ///
    /// Used when another surface (sync, another process) mutated the slot.
    pub fn reload(&self, key: &str) -> StoreResult<()> {
        let slot = self.slot(key)?;
        let _writer = slot.lock_writer();
        let loaded = slot::load_entry(self.inner.storage.as_ref(), slot.key())?;
        slot.commit(loaded);
        Ok(())
    }

    /// Removes every entry from storage and resets all cached slots.
    ///
    /// Bindings fall back to their defaults afterwards.
    pub fn clear(&self) -> StoreResult<()> {
        self.inner.storage.clear()?;

        let slots: Vec<Arc<Slot>> = self.lock_slots().values().cloned().collect();
        for slot in &slots {
            let _writer = slot.lock_writer();
            slot.commit(None);
        }

        info!(
            "event=store_clear module=store status=ok slots={}",
            slots.len()
        );
        Ok(())
    }

    fn slot(&self, key: &str) -> StoreResult<Arc<Slot>> {
        if key.trim().is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        let mut slots = self.lock_slots();
        if let Some(slot) = slots.get(key) {
            return Ok(Arc::clone(slot));
        }

        let initial = match slot::load_entry(self.inner.storage.as_ref(), key) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    "event=store_load module=store status=fallback key={key} reason=storage_read_failed error={err}"
                );
                None
            }
        };
        let slot = Arc::new(Slot::new(key, initial));
        slots.insert(key.to_string(), Arc::clone(&slot));
        Ok(slot)
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Arc<Slot>>> {
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{Store, StoreError};
    use crate::storage::{KeyValueStorage, MemoryStorage};
    use std::sync::Arc;

    #[test]
    fn blank_key_is_rejected() {
        let store = Store::in_memory();
        let err = store.open("  ", 0_i32).err().expect("blank key must fail");
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[test]
    fn reload_picks_up_external_mutation() {
        let storage = Arc::new(MemoryStorage::new());
        let store = Store::new(storage.clone());
        let binding = store.open("counter", 0_i32).unwrap();
        assert_eq!(binding.value(), 0);

        storage.set("counter", "41").unwrap();
        assert_eq!(binding.value(), 0);

        store.reload("counter").unwrap();
        assert_eq!(binding.value(), 41);
    }

    #[test]
    fn clear_resets_bindings_to_fallback() {
        let storage = Arc::new(MemoryStorage::new());
        let store = Store::new(storage.clone());
        let binding = store.open("counter", 7_i32).unwrap();
        binding.set(9).unwrap();

        store.clear().unwrap();
        assert_eq!(binding.value(), 7);
        assert!(storage.is_empty());
    }
}
