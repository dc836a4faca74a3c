//! PIN gate for opening the vault.
//!
//! # Responsibility
//! - Store a salted BLAKE3 digest of the PIN in the `settings` slot.
//! - Verify unlock attempts without ever persisting or logging the PIN.
//!
//! # Invariants
//! - PINs are 4 to 8 ASCII digits.
//! - Digest comparison is constant time (`blake3::Hash` equality).
//! - A vault without a PIN unlocks unconditionally.

use crate::model::settings::{AppSettings, SETTINGS_KEY};
use crate::store::{Binding, Store, StoreError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const PIN_MIN_DIGITS: usize = 4;
const PIN_MAX_DIGITS: usize = 8;

#[derive(Debug)]
pub enum LockError {
    /// PIN does not satisfy the format rules.
    InvalidPin(&'static str),
    /// PIN did not match the stored digest.
    WrongPin,
    /// Stored digest is unreadable; the lock must be reset.
    CorruptDigest,
    Store(StoreError),
}

impl Display for LockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPin(details) => write!(f, "invalid pin: {details}"),
            Self::WrongPin => write!(f, "wrong pin"),
            Self::CorruptDigest => write!(f, "stored pin digest is corrupt"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LockError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for LockError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// PIN and biometric preferences backed by the settings slot.
#[derive(Clone)]
pub struct PinLock {
    settings: Binding<AppSettings>,
}

impl PinLock {
    pub fn open(store: &Store) -> Result<Self, LockError> {
        Ok(Self {
            settings: store.open(SETTINGS_KEY, AppSettings::default())?,
        })
    }

    /// True once any PIN material is stored, including a half-written pair.
    pub fn is_enabled(&self) -> bool {
        let settings = self.settings.value();
        settings.pin_hash.is_some() || settings.pin_salt.is_some()
    }

    /// Sets or replaces the PIN with a fresh salt.
    pub fn set_pin(&self, pin: &str) -> Result<(), LockError> {
        validate_pin(pin)?;
        let salt = Uuid::new_v4().simple().to_string();
        let digest = pin_digest(&salt, pin).to_hex().to_string();
        self.settings.update(|mut settings| {
            settings.pin_salt = Some(salt);
            settings.pin_hash = Some(digest);
            settings
        })?;
        info!("event=pin_set module=lock status=ok");
        Ok(())
    }

    /// Checks `pin` against the stored digest.
    ///
    /// Unlocks only when no PIN material is stored at all; a digest without
    /// its salt (or the reverse) is reported as `CorruptDigest`.
    pub fn verify(&self, pin: &str) -> Result<(), LockError> {
        let settings = self.settings.value();
        let (hash, salt) = match (settings.pin_hash, settings.pin_salt) {
            (None, None) => return Ok(()),
            (Some(hash), Some(salt)) => (hash, salt),
            (hash, salt) => {
                warn!(
                    "event=pin_verify module=lock status=error reason=corrupt_digest has_hash={} has_salt={}",
                    hash.is_some(),
                    salt.is_some()
                );
                return Err(LockError::CorruptDigest);
            }
        };

        let stored = blake3::Hash::from_hex(hash.as_str()).map_err(|_| LockError::CorruptDigest)?;
        if stored == pin_digest(&salt, pin) {
            Ok(())
        } else {
            warn!("event=pin_verify module=lock status=denied");
            Err(LockError::WrongPin)
        }
    }

    /// Removes the PIN after verifying the current one.
    pub fn clear(&self, current_pin: &str) -> Result<(), LockError> {
        self.verify(current_pin)?;
        self.settings.update(|mut settings| {
            settings.pin_hash = None;
            settings.pin_salt = None;
            settings.biometric_enabled = false;
            settings
        })?;
        info!("event=pin_clear module=lock status=ok");
        Ok(())
    }

    pub fn biometric_enabled(&self) -> bool {
        self.settings.value().biometric_enabled
    }

    /// Biometric unlock is only offered on top of a PIN.
    pub fn set_biometric(&self, enabled: bool) -> Result<(), LockError> {
        if enabled && !self.is_enabled() {
            return Err(LockError::InvalidPin("set a pin before enabling biometrics"));
        }
        self.settings.update(|mut settings| {
            settings.biometric_enabled = enabled;
            settings
        })?;
        Ok(())
    }
}

fn validate_pin(pin: &str) -> Result<(), LockError> {
    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(LockError::InvalidPin("pin must contain digits only"));
    }
    if !(PIN_MIN_DIGITS..=PIN_MAX_DIGITS).contains(&pin.len()) {
        return Err(LockError::InvalidPin("pin must be 4 to 8 digits"));
    }
    Ok(())
}

fn pin_digest(salt: &str, pin: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(pin.as_bytes());
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::{LockError, PinLock};
    use crate::model::settings::{AppSettings, SETTINGS_KEY};
    use crate::storage::{KeyValueStorage, MemoryStorage};
    use crate::store::Store;
    use std::sync::Arc;

    #[test]
    fn vault_without_pin_always_unlocks() {
        let lock = PinLock::open(&Store::in_memory()).unwrap();
        assert!(!lock.is_enabled());
        lock.verify("anything").unwrap();
    }

    #[test]
    fn pin_round_trip_and_persisted_digest_hides_pin() {
        let storage = Arc::new(MemoryStorage::new());
        let lock = PinLock::open(&Store::new(storage.clone())).unwrap();
        lock.set_pin("123456").unwrap();

        let raw = storage.get("settings").unwrap().unwrap();
        assert!(!raw.contains("123456"));

        let reopened = PinLock::open(&Store::new(storage)).unwrap();
        assert!(reopened.is_enabled());
        reopened.verify("123456").unwrap();
        assert!(matches!(reopened.verify("654321"), Err(LockError::WrongPin)));
    }

    #[test]
    fn invalid_pins_are_rejected() {
        let lock = PinLock::open(&Store::in_memory()).unwrap();
        assert!(matches!(lock.set_pin("12a4"), Err(LockError::InvalidPin(_))));
        assert!(matches!(lock.set_pin("123"), Err(LockError::InvalidPin(_))));
        assert!(matches!(
            lock.set_pin("123456789"),
            Err(LockError::InvalidPin(_))
        ));
    }

    #[test]
    fn clearing_requires_current_pin_and_disables_biometrics() {
        let lock = PinLock::open(&Store::in_memory()).unwrap();
        assert!(lock.set_biometric(true).is_err());

        lock.set_pin("2468").unwrap();
        lock.set_biometric(true).unwrap();
        assert!(matches!(lock.clear("0000"), Err(LockError::WrongPin)));

        lock.clear("2468").unwrap();
        assert!(!lock.is_enabled());
        assert!(!lock.biometric_enabled());
    }

    #[test]
    fn half_written_pin_material_never_unlocks() {
        let store = Store::in_memory();
        let lock = PinLock::open(&store).unwrap();
        lock.set_pin("1234").unwrap();

        let settings = store.open(SETTINGS_KEY, AppSettings::default()).unwrap();
        settings
            .update(|mut value| {
                value.pin_salt = None;
                value
            })
            .unwrap();

        assert!(lock.is_enabled());
        assert!(matches!(lock.verify("0000"), Err(LockError::CorruptDigest)));
        assert!(matches!(lock.verify("1234"), Err(LockError::CorruptDigest)));
        assert!(matches!(lock.clear("1234"), Err(LockError::CorruptDigest)));

        settings
            .set(AppSettings {
                pin_salt: Some("salt".to_string()),
                ..AppSettings::default()
            })
            .unwrap();
        assert!(lock.is_enabled());
        assert!(matches!(lock.verify("0000"), Err(LockError::CorruptDigest)));
    }
}
