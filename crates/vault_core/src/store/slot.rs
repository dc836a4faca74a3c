//! Per-key cache cell shared by every binding of one key.

use crate::storage::{KeyValueStorage, StorageResult};
use log::warn;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

pub(crate) type Listener = Arc<dyn Fn(Option<&Value>) + Send + Sync>;

pub(crate) struct Slot {
    key: String,
    writer: Mutex<()>,
    snapshot: RwLock<Option<Value>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
}

impl Slot {
    pub(crate) fn new(key: &str, initial: Option<Value>) -> Self {
        Self {
            key: key.to_string(),
            writer: Mutex::new(()),
            snapshot: RwLock::new(initial),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    /// Serializes mutations of this slot; held across compute, commit and write.
    pub(crate) fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> Option<Value> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the in-memory value and notifies listeners.
    ///
    /// Callers must hold the writer lock so notifications follow commit order.
    pub(crate) fn commit(&self, next: Option<Value>) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = next.clone();

        let listeners: Vec<Listener> = self
            .lock_listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(next.as_ref());
        }
    }

    pub(crate) fn add_listener(&self, listener: Listener) -> u64 {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.lock_listeners().push((id, listener));
        id
    }

    pub(crate) fn remove_listener(&self, id: u64) {
        self.lock_listeners()
            .retain(|(listener_id, _)| *listener_id != id);
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reads and parses one entry. Unparseable entries are logged and treated as
/// absent; only storage transport errors are returned.
pub(crate) fn load_entry(
    storage: &dyn KeyValueStorage,
    key: &str,
) -> StorageResult<Option<Value>> {
    let Some(raw) = storage.get(key)? else {
        return Ok(None);
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            warn!(
                "event=store_load module=store status=fallback key={key} reason=invalid_json bytes={} error={err}",
                raw.len()
            );
            Ok(None)
        }
    }
}
