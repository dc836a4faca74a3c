//! Registered cloud providers and the active selection.
//!
//! The vault owns one registry; the selected id is persisted in settings and
//! re-selected when that provider registers again after a restart.

use super::provider::{CloudProvider, ProviderError, ProviderResult, SyncStage};
use log::info;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderRegistryError {
    InvalidProviderId(String),
    DuplicateProviderId(String),
    ProviderNotFound(String),
}

impl Display for ProviderRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidProviderId(value) => {
                write!(f, "sync provider id must match [a-z0-9_-]+: `{value}`")
            }
            Self::DuplicateProviderId(value) => {
                write!(f, "sync provider `{value}` is already registered")
            }
            Self::ProviderNotFound(value) => write!(f, "sync provider `{value}` is not registered"),
        }
    }
}

impl Error for ProviderRegistryError {}

/// Registered cloud providers (e.g. `firebase`, `supabase`, `memory`).
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn CloudProvider>>,
    active_provider_id: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one provider adapter under its trimmed id.
    pub fn register(
        &mut self,
        provider: Arc<dyn CloudProvider>,
    ) -> Result<(), ProviderRegistryError> {
        let provider_id = provider.provider_id().trim().to_string();
        if !is_valid_provider_id(&provider_id) {
            return Err(ProviderRegistryError::InvalidProviderId(provider_id));
        }
        match self.providers.entry(provider_id) {
            Entry::Occupied(entry) => Err(ProviderRegistryError::DuplicateProviderId(
                entry.key().clone(),
            )),
            Entry::Vacant(entry) => {
                info!(
                    "event=sync_register module=sync status=ok provider={}",
                    entry.key()
                );
                entry.insert(provider);
                Ok(())
            }
        }
    }

    /// Registered ids in sorted order.
    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn contains(&self, provider_id: &str) -> bool {
        self.providers.contains_key(provider_id.trim())
    }

    pub fn select_active(&mut self, provider_id: &str) -> Result<(), ProviderRegistryError> {
        let normalized = provider_id.trim();
        if !self.contains(normalized) {
            return Err(ProviderRegistryError::ProviderNotFound(
                normalized.to_string(),
            ));
        }
        self.active_provider_id = Some(normalized.to_string());
        info!("event=sync_select module=sync status=ok provider={normalized}");
        Ok(())
    }

    /// Sync disabled.
    pub fn clear_active(&mut self) {
        self.active_provider_id = None;
    }

    pub fn active_provider_id(&self) -> Option<&str> {
        self.active_provider_id.as_deref()
    }

    /// Returns the active provider or a `provider_not_selected` error.
    pub fn require_active(&self, stage: SyncStage) -> ProviderResult<Arc<dyn CloudProvider>> {
        self.active_provider_id()
            .and_then(|id| self.providers.get(id).cloned())
            .ok_or_else(|| {
                ProviderError::new(
                    "registry",
                    stage,
                    "provider_not_selected",
                    "no sync provider is selected",
                    false,
                )
            })
    }
}

fn is_valid_provider_id(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-'))
}
