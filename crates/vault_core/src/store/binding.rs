//! Typed handle over one slot.

use super::slot::{Listener, Slot};
use super::{StoreError, StoreResult};
use crate::storage::KeyValueStorage;
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Weak};

/// Next value for a slot: a literal replacement or a function of the latest
/// committed value.
pub enum SetValue<T> {
    Replace(T),
    Update(Box<dyn FnOnce(T) -> T + Send>),
}

impl<T> SetValue<T> {
    pub fn update(updater: impl FnOnce(T) -> T + Send + 'static) -> Self {
        Self::Update(Box::new(updater))
    }
}

impl<T> From<T> for SetValue<T> {
    fn from(value: T) -> Self {
        Self::Replace(value)
    }
}

/// Read/write binding to one key.
///
/// Every binding of the same key opened from the same `Store` shares one
/// cached value. `fallback` is per binding and is used while the slot has no
/// decodable entry.
pub struct Binding<T> {
    slot: Arc<Slot>,
    storage: Arc<dyn KeyValueStorage>,
    fallback: T,
}

impl<T: Clone> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            storage: Arc::clone(&self.storage),
            fallback: self.fallback.clone(),
        }
    }
}

impl<T> Binding<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub(super) fn new(slot: Arc<Slot>, storage: Arc<dyn KeyValueStorage>, fallback: T) -> Self {
        Self {
            slot,
            storage,
            fallback,
        }
    }

    pub fn key(&self) -> &str {
        self.slot.key()
    }

    pub fn fallback(&self) -> &T {
        &self.fallback
    }

    /// Returns the most recently committed value, or the fallback.
    pub fn value(&self) -> T {
        decode_or(self.slot.snapshot().as_ref(), &self.fallback, self.slot.key())
    }

    /// Replaces the value.
    ///
    /// # Errors
    /// - `Encode` when `next` is not JSON-encodable; nothing changes.
    /// - `Persist` when the durable write fails; the in-memory value and
    ///   subscribers are already updated.
    pub fn set(&self, next: T) -> StoreResult<()> {
        self.try_update(|_| Ok::<_, StoreError>(next))
    }

    /// Computes the next value from the latest committed one.
    ///
    /// Runs under the slot's writer lock, so back-to-back updates never read
    /// a stale value.
    pub fn update(&self, updater: impl FnOnce(T) -> T) -> StoreResult<()> {
        self.try_update(|prev| Ok::<_, StoreError>(updater(prev)))
    }

    /// Applies either form of `SetValue`.
    pub fn apply(&self, change: impl Into<SetValue<T>>) -> StoreResult<()> {
        match change.into() {
            SetValue::Replace(next) => self.set(next),
            SetValue::Update(updater) => self.update(updater),
        }
    }

    /// Like `update`, but the updater may reject the change. A rejected
    /// change performs no write and no notification.
    pub fn try_update<E>(&self, updater: impl FnOnce(T) -> Result<T, E>) -> Result<(), E>
    where
        E: From<StoreError>,
    {
        let key = self.slot.key();
        let _writer = self.slot.lock_writer();

        let prev = decode_or(self.slot.snapshot().as_ref(), &self.fallback, key);
        let next = updater(prev)?;
        let encoded = serde_json::to_value(&next).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        let raw = encoded.to_string();

        self.slot.commit(Some(encoded));

        if let Err(source) = self.storage.set(key, &raw) {
            error!(
                "event=store_write module=store status=error key={key} bytes={} error={source}",
                raw.len()
            );
            return Err(StoreError::Persist {
                key: key.to_string(),
                source,
            }
            .into());
        }

        debug!(
            "event=store_write module=store status=ok key={key} bytes={}",
            raw.len()
        );
        Ok(())
    }

    /// Registers `on_change`, called with the new value after every commit
    /// to this key from any binding.
    ///
    /// Callbacks run on the writer's thread while the key's writer lock is
    /// held; they may read the key but must not write it.
    pub fn subscribe<F>(&self, on_change: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        let fallback = self.fallback.clone();
        let key = self.slot.key().to_string();
        let listener: Listener = Arc::new(move |value: Option<&Value>| {
            let decoded = decode_or(value, &fallback, &key);
            on_change(&decoded);
        });
        let id = self.slot.add_listener(listener);
        Subscription {
            slot: Arc::downgrade(&self.slot),
            id,
        }
    }

    /// Number of live subscriptions on this key.
    pub fn subscriber_count(&self) -> usize {
        self.slot.listener_count()
    }
}

/// Live subscription; unsubscribes when dropped.
pub struct Subscription {
    slot: Weak<Slot>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.upgrade() {
            slot.remove_listener(self.id);
        }
    }
}

fn decode_or<T>(value: Option<&Value>, fallback: &T, key: &str) -> T
where
    T: DeserializeOwned + Clone,
{
    let Some(value) = value else {
        return fallback.clone();
    };

    match T::deserialize(value) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(
                "event=store_decode module=store status=fallback key={key} reason=shape_mismatch error={err}"
            );
            fallback.clone()
        }
    }
}
