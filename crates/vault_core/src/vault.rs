//! Vault facade wiring every record service to one store.
//!
//! # Responsibility
//! - Open storage from config and build services over a shared `Store`.
//! - Route imports to the right collection and assemble exports.
//! - Own the sync provider registry and attach collections to the selected
//!   provider; the selection survives restarts through the settings slot.

use crate::config::{ConfigError, VaultConfig};
use crate::lock::{LockError, PinLock};
use crate::model::list::ShoppingList;
use crate::model::note::Note;
use crate::model::settings::{AppSettings, SETTINGS_KEY};
use crate::service::list_service::ListService;
use crate::service::note_service::NoteService;
use crate::service::password_service::PasswordService;
use crate::service::reminder_service::ReminderService;
use crate::service::ServiceError;
use crate::share::{decode_import, render_text_export, ExportOptions, ImportPayload, VaultExport};
use crate::storage::{KeyValueStorage, MemoryStorage};
use crate::store::{Binding, Store, StoreError};
use crate::sync::{
    CloudProvider, CollectionMirror, ProviderError, ProviderRegistry, ProviderRegistryError,
    SyncStage,
};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug)]
pub enum VaultError {
    Config(ConfigError),
    Service(ServiceError),
    Lock(LockError),
    Sync(ProviderError),
    Registry(ProviderRegistryError),
    Encode(serde_json::Error),
}

impl Display for VaultError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Lock(err) => write!(f, "{err}"),
            Self::Sync(err) => write!(f, "{err}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "export encode error: {err}"),
        }
    }
}

impl Error for VaultError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Service(err) => Some(err),
            Self::Lock(err) => Some(err),
            Self::Sync(err) => Some(err),
            Self::Registry(err) => Some(err),
            Self::Encode(err) => Some(err),
        }
    }
}

impl From<ConfigError> for VaultError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<ServiceError> for VaultError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<StoreError> for VaultError {
    fn from(value: StoreError) -> Self {
        Self::Service(ServiceError::Store(value))
    }
}

impl From<LockError> for VaultError {
    fn from(value: LockError) -> Self {
        Self::Lock(value)
    }
}

impl From<ProviderError> for VaultError {
    fn from(value: ProviderError) -> Self {
        Self::Sync(value)
    }
}

impl From<ProviderRegistryError> for VaultError {
    fn from(value: ProviderRegistryError) -> Self {
        Self::Registry(value)
    }
}

/// Records added by one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub notes: usize,
    pub lists: usize,
    pub reminders: usize,
    pub passwords: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.notes + self.lists + self.reminders + self.passwords
    }
}

/// Live cloud mirrors for notes and lists.
///
/// Dropping this stops both directions; `Vault::detach_sync` also forgets
/// the persisted provider.
pub struct VaultSync {
    provider_id: String,
    pub notes: CollectionMirror<Note>,
    pub lists: CollectionMirror<ShoppingList>,
}

impl VaultSync {
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Local notes and lists not yet accepted by the provider.
    pub fn pending_count(&self) -> usize {
        self.notes.pending().len() + self.lists.pending().len()
    }

    /// Retries uploading pending records; returns how many went through.
    pub fn publish_pending(&self) -> usize {
        self.notes.publish_pending() + self.lists.publish_pending()
    }
}

/// One opened vault.
#[derive(Clone)]
pub struct Vault {
    store: Store,
    notes: NoteService,
    lists: ListService,
    passwords: PasswordService,
    reminders: ReminderService,
    lock: PinLock,
    providers: Arc<RwLock<ProviderRegistry>>,
}

impl Vault {
    pub fn open(storage: Arc<dyn KeyValueStorage>) -> VaultResult<Self> {
        let store = Store::new(storage);
        Ok(Self {
            notes: NoteService::open(&store)?,
            lists: ListService::open(&store)?,
            passwords: PasswordService::open(&store)?,
            reminders: ReminderService::open(&store)?,
            lock: PinLock::open(&store)?,
            providers: Arc::default(),
            store,
        })
    }

    pub fn from_config(config: &VaultConfig) -> VaultResult<Self> {
        let vault = Self::open(config.open_storage()?)?;
        info!(
            "event=vault_open module=vault status=ok backend={:?}",
            config.storage
        );
        Ok(vault)
    }

    /// Vault over a fresh process-local map.
    pub fn in_memory() -> VaultResult<Self> {
        Self::open(Arc::new(MemoryStorage::new()))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn notes(&self) -> &NoteService {
        &self.notes
    }

    pub fn lists(&self) -> &ListService {
        &self.lists
    }

    pub fn passwords(&self) -> &PasswordService {
        &self.passwords
    }

    pub fn reminders(&self) -> &ReminderService {
        &self.reminders
    }

    pub fn lock(&self) -> &PinLock {
        &self.lock
    }

    /// Snapshot of every collection in stored order.
    pub fn export(&self, options: ExportOptions) -> VaultExport {
        let passwords = options
            .include_passwords
            .then(|| self.passwords.collection().all());
        VaultExport::new(
            self.notes.collection().all(),
            self.lists.collection().all(),
            self.reminders.collection().all(),
            passwords,
        )
    }

    pub fn export_json(&self, options: ExportOptions) -> VaultResult<String> {
        let json = self
            .export(options)
            .to_json_pretty()
            .map_err(VaultError::Encode)?;
        info!(
            "event=vault_export module=vault status=ok include_passwords={} bytes={}",
            options.include_passwords,
            json.len()
        );
        Ok(json)
    }

    /// Notes and lists as readable text; passwords are never included.
    pub fn export_text(&self) -> String {
        render_text_export(&self.notes.list_notes(), &self.lists.list_lists())
    }

    /// Imports a share string or a full export.
    ///
    /// Every imported record is prepended; ids that are blank or already
    /// present get fresh ones.
    pub fn import(&self, text: &str) -> VaultResult<ImportSummary> {
        let payload = decode_import(text).map_err(ServiceError::from)?;
        let summary = match payload {
            ImportPayload::Note(shared) => {
                self.notes.import_shared(shared)?;
                ImportSummary {
                    notes: 1,
                    ..ImportSummary::default()
                }
            }
            ImportPayload::List(shared) => {
                self.lists.import_shared(shared)?;
                ImportSummary {
                    lists: 1,
                    ..ImportSummary::default()
                }
            }
            ImportPayload::Export(export) => self.import_export(*export)?,
        };

        info!(
            "event=vault_import module=vault status=ok notes={} lists={} reminders={} passwords={}",
            summary.notes, summary.lists, summary.reminders, summary.passwords
        );
        Ok(summary)
    }

    fn import_export(&self, export: VaultExport) -> VaultResult<ImportSummary> {
        let mut summary = ImportSummary::default();
        if !export.notes.is_empty() {
            summary.notes = self
                .notes
                .collection()
                .insert_all_front(export.notes)
                .map_err(ServiceError::from)?
                .len();
        }
        if !export.lists.is_empty() {
            summary.lists = self
                .lists
                .collection()
                .insert_all_front(export.lists)
                .map_err(ServiceError::from)?
                .len();
        }
        if !export.reminders.is_empty() {
            summary.reminders = self
                .reminders
                .collection()
                .insert_all_front(export.reminders)
                .map_err(ServiceError::from)?
                .len();
        }
        if let Some(passwords) = export.passwords.filter(|entries| !entries.is_empty()) {
            summary.passwords = self
                .passwords
                .collection()
                .insert_all_front(passwords)
                .map_err(ServiceError::from)?
                .len();
        }
        Ok(summary)
    }

    /// Registers a sync provider adapter.
    ///
    /// When its id is the persisted sync provider, it becomes the active
    /// selection again; call `resume_sync` to reattach.
    pub fn register_provider(&self, provider: Arc<dyn CloudProvider>) -> VaultResult<()> {
        let persisted = self.sync_provider()?;
        let mut registry = self.write_providers();
        let provider_id = provider.provider_id().trim().to_string();
        registry.register(provider)?;
        let was_selected = persisted.as_deref() == Some(provider_id.as_str());
        if was_selected && registry.active_provider_id().is_none() {
            registry.select_active(&provider_id)?;
        }
        Ok(())
    }

    pub fn provider_ids(&self) -> Vec<String> {
        self.read_providers().provider_ids()
    }

    pub fn active_provider_id(&self) -> Option<String> {
        self.read_providers().active_provider_id().map(str::to_string)
    }

    /// Selects `provider_id`, mirrors notes and lists through it and
    /// persists the choice.
    ///
    /// Local records the remote has never seen are uploaded; after that
    /// remote snapshots merge into local state (last write wins per id).
    pub fn attach_sync(&self, provider_id: &str) -> VaultResult<VaultSync> {
        let provider = {
            let mut registry = self.write_providers();
            registry.select_active(provider_id)?;
            registry.require_active(SyncStage::Subscribe)?
        };
        let provider_id = provider.provider_id().trim().to_string();

        let sync = VaultSync {
            notes: CollectionMirror::attach(Arc::clone(&provider), self.notes.collection().clone())?,
            lists: CollectionMirror::attach(provider, self.lists.collection().clone())?,
            provider_id: provider_id.clone(),
        };

        self.settings()?.update(|mut settings| {
            settings.sync_provider = Some(provider_id);
            settings
        })?;
        Ok(sync)
    }

    /// Reattaches the persisted provider if it is registered.
    pub fn resume_sync(&self) -> VaultResult<Option<VaultSync>> {
        let Some(provider_id) = self.sync_provider()? else {
            return Ok(None);
        };
        if !self.read_providers().contains(&provider_id) {
            warn!(
                "event=sync_resume module=vault status=skipped reason=provider_not_registered provider={provider_id}"
            );
            return Ok(None);
        }
        self.attach_sync(&provider_id).map(Some)
    }

    /// Stops mirroring and forgets the persisted provider. Local records
    /// stay as they are.
    pub fn detach_sync(&self, sync: VaultSync) -> VaultResult<()> {
        let provider_id = sync.provider_id().to_string();
        drop(sync);
        self.write_providers().clear_active();
        self.settings()?.update(|mut settings| {
            settings.sync_provider = None;
            settings
        })?;
        info!("event=sync_detach module=vault status=ok provider={provider_id}");
        Ok(())
    }

    /// Persisted sync provider id, if sync is enabled.
    pub fn sync_provider(&self) -> VaultResult<Option<String>> {
        Ok(self.settings()?.value().sync_provider)
    }

    /// Wipes every slot in the vault's storage.
    pub fn reset(&self) -> VaultResult<()> {
        self.store.clear()?;
        info!("event=vault_reset module=vault status=ok");
        Ok(())
    }

    fn settings(&self) -> VaultResult<Binding<AppSettings>> {
        Ok(self.store.open(SETTINGS_KEY, AppSettings::default())?)
    }

    fn read_providers(&self) -> RwLockReadGuard<'_, ProviderRegistry> {
        self.providers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_providers(&self) -> RwLockWriteGuard<'_, ProviderRegistry> {
        self.providers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{ImportSummary, Vault, VaultError};
    use crate::share::{ExportOptions, ShareFormat};
    use crate::service::password_service::PasswordDraft;
    use crate::sync::{CloudDocument, CloudProvider, MemoryCloud, ProviderRegistryError};
    use serde_json::json;
    use std::sync::Arc;

    fn draft(title: &str) -> PasswordDraft {
        PasswordDraft {
            title: title.to_string(),
            password: "hunter2".to_string(),
            username: None,
            url: None,
            notes: None,
        }
    }

    #[test]
    fn shared_note_import_prepends_with_fresh_id() {
        let vault = Vault::in_memory().unwrap();
        let existing = vault
            .notes()
            .create_note("Existing".to_string(), "body".to_string())
            .unwrap();

        let summary = vault
            .import(r#"NOTE:{"title":"Hi","content":"Body"}"#)
            .unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                notes: 1,
                ..ImportSummary::default()
            }
        );

        let notes = vault.notes().collection().all();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].title, "Hi");
        assert_ne!(notes[0].id, existing.id);
    }

    #[test]
    fn export_round_trip_rekeys_colliding_ids() {
        let source = Vault::in_memory().unwrap();
        source
            .notes()
            .create_note("One".to_string(), String::new())
            .unwrap();
        let list = source.lists().create_list("Groceries").unwrap();
        source.lists().add_item(&list.id, "Milk").unwrap();
        source.passwords().add_password(draft("Email")).unwrap();

        let json = source
            .export_json(ExportOptions {
                include_passwords: true,
            })
            .unwrap();

        // Importing into the same vault collides on every id.
        let summary = source.import(&json).unwrap();
        assert_eq!(summary.total(), 3);

        let notes = source.notes().collection().all();
        assert_eq!(notes.len(), 2);
        assert_ne!(notes[0].id, notes[1].id);
        let lists = source.lists().collection().all();
        assert_eq!(lists[0].items.len(), 1);
        assert_ne!(lists[0].id, lists[1].id);
        assert_eq!(source.passwords().collection().len(), 2);
    }

    #[test]
    fn default_export_leaves_passwords_out() {
        let vault = Vault::in_memory().unwrap();
        vault.passwords().add_password(draft("Bank")).unwrap();

        let json = vault.export_json(ExportOptions::default()).unwrap();
        assert!(!json.contains("hunter2"));

        let target = Vault::in_memory().unwrap();
        let summary = target.import(&json).unwrap();
        assert_eq!(summary.passwords, 0);
    }

    #[test]
    fn shared_list_round_trips_between_vaults() {
        let source = Vault::in_memory().unwrap();
        let list = source.lists().create_list("Trip").unwrap();
        source.lists().add_item(&list.id, "Passport").unwrap();
        let shared = source
            .lists()
            .share_list(&list.id, ShareFormat::Envelope)
            .unwrap();

        let target = Vault::in_memory().unwrap();
        let summary = target.import(&shared).unwrap();
        assert_eq!(summary.lists, 1);
        let imported = &target.lists().list_lists()[0];
        assert_eq!(imported.title, "Trip");
        assert_eq!(imported.items[0].text, "Passport");
    }

    #[test]
    fn attach_sync_keeps_local_notes_and_records_provider() {
        let cloud = Arc::new(MemoryCloud::new("memory"));
        cloud
            .add(
                "notes",
                CloudDocument {
                    id: "remote-1".to_string(),
                    body: json!({
                        "title": "From cloud",
                        "content": "",
                        "createdAt": "2024-01-01T00:00:00.000Z",
                        "updatedAt": "2024-01-01T00:00:00.000Z"
                    }),
                },
            )
            .unwrap();

        let vault = Vault::in_memory().unwrap();
        let local = vault
            .notes()
            .create_note("Local".to_string(), String::new())
            .unwrap();
        vault.register_provider(cloud.clone()).unwrap();

        let sync = vault.attach_sync("memory").unwrap();
        let ids: Vec<String> = vault
            .notes()
            .collection()
            .all()
            .into_iter()
            .map(|note| note.id)
            .collect();
        assert_eq!(ids, vec![local.id.clone(), "remote-1".to_string()]);
        assert_eq!(cloud.documents("notes")[0].id, local.id);
        assert_eq!(sync.pending_count(), 0);
        assert_eq!(vault.sync_provider().unwrap().as_deref(), Some("memory"));
        assert_eq!(vault.active_provider_id().as_deref(), Some("memory"));

        vault.detach_sync(sync).unwrap();
        assert_eq!(vault.sync_provider().unwrap(), None);
        assert_eq!(vault.active_provider_id(), None);
        assert_eq!(vault.notes().collection().len(), 2);
    }

    #[test]
    fn attach_to_unknown_provider_is_rejected() {
        let vault = Vault::in_memory().unwrap();
        assert!(matches!(
            vault.attach_sync("firebase"),
            Err(VaultError::Registry(ProviderRegistryError::ProviderNotFound(_)))
        ));
        assert_eq!(vault.sync_provider().unwrap(), None);
    }

    #[test]
    fn reset_wipes_everything() {
        let vault = Vault::in_memory().unwrap();
        vault
            .notes()
            .create_note("Gone".to_string(), String::new())
            .unwrap();
        vault.lock().set_pin("1234").unwrap();

        vault.reset().unwrap();
        assert!(vault.notes().collection().is_empty());
        assert!(!vault.lock().is_enabled());
    }
}
