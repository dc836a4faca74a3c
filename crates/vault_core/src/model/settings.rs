//! App-level settings slot.

use serde::{Deserialize, Serialize};

/// Slot key for `AppSettings`.
pub const SETTINGS_KEY: &str = "settings";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// Hex BLAKE3 digest of salt + PIN; `None` when the lock is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_salt: Option<String>,
    #[serde(default)]
    pub biometric_enabled: bool,
    /// Selected cloud provider id, if sync is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_provider: Option<String>,
}
