//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level vault functions to Dart via FRB.
//! - Flatten core errors into response envelopes the UI can show.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Passwords never leave Rust except through `password_reveal`.
//! - One vault per process, opened lazily at the configured path.
//! - At most one live sync attachment; opening the vault resumes the
//!   persisted provider when it is registered.

use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use vault_core::model::timestamp::from_epoch_millis;
use vault_core::service::note_service::derive_preview;
use vault_core::service::password_service::PasswordDraft;
use vault_core::sync::MemoryCloud;
use vault_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    ExportOptions, ShareFormat, SqliteStorage, Vault, VaultSync,
};

const VAULT_DB_FILE_NAME: &str = "vault_entry.sqlite3";
/// Provider id of the in-process cloud registered with every vault.
const LOCAL_CLOUD_ID: &str = "memory";
static VAULT_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static VAULT: OnceLock<Result<Vault, String>> = OnceLock::new();
static SYNC: Mutex<Option<VaultSync>> = Mutex::new(None);

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// # FFI contract
/// - `level`: `trace|debug|info|warn|error`, case-insensitive.
/// - `log_dir`: absolute directory for rolling logs.
/// - Idempotent for the same inputs; returns empty string on success and an
///   error message otherwise.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Pins the vault database location before first use.
///
/// # FFI contract
/// - Must be called before any record API; later calls with a different
///   path are rejected.
/// - Returns empty string on success and an error message otherwise.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_vault(db_path: String) -> String {
    let trimmed = db_path.trim();
    if trimmed.is_empty() {
        return "db_path cannot be empty".to_string();
    }
    let requested = PathBuf::from(trimmed);
    let active = VAULT_DB_PATH.get_or_init(|| requested.clone());
    if *active == requested {
        String::new()
    } else {
        format!(
            "vault already configured at `{}`; refusing to switch",
            active.display()
        )
    }
}

/// Result envelope for mutating calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// Id of the created or changed record.
    pub id: Option<String>,
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>, id: Option<String>) -> Self {
        Self {
            ok: true,
            id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id: None,
            message: message.into(),
        }
    }
}

/// Result envelope for calls producing text (share strings, exports).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextResponse {
    pub ok: bool,
    pub text: String,
    pub message: String,
}

impl TextResponse {
    fn from_result<E: std::fmt::Display>(op: &str, result: Result<String, E>) -> Self {
        match result {
            Ok(text) => Self {
                ok: true,
                text,
                message: String::new(),
            },
            Err(err) => Self {
                ok: false,
                text: String::new(),
                message: format!("{op} failed: {err}"),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteItem {
    pub id: String,
    pub title: String,
    /// Plain-text preview capped for list display.
    pub preview: Option<String>,
    pub pinned: bool,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSummary {
    pub id: String,
    pub title: String,
    pub checked: u32,
    pub total: u32,
}

/// Password row without the secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordItem {
    pub id: String,
    pub title: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderItem {
    pub id: String,
    pub title: String,
    pub due_at: String,
    pub record_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub attached: bool,
    pub provider_id: Option<String>,
    /// Local notes and lists the provider has not accepted yet.
    pub pending: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResponse {
    pub ok: bool,
    pub notes: u32,
    pub lists: u32,
    pub reminders: u32,
    pub passwords: u32,
    pub message: String,
}

/// Notes ordered pinned first, then most recently updated.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_list() -> Vec<NoteItem> {
    with_vault(|vault| vault.notes().list_notes())
        .map(|notes| notes.into_iter().map(to_note_item).collect())
        .unwrap_or_default()
}

#[flutter_rust_bridge::frb(sync)]
pub fn notes_search(query: String) -> Vec<NoteItem> {
    with_vault(|vault| vault.notes().search_notes(query.as_str()))
        .map(|notes| notes.into_iter().map(to_note_item).collect())
        .unwrap_or_default()
}

#[flutter_rust_bridge::frb(sync)]
pub fn note_create(title: String, content: String) -> ActionResponse {
    action("note_create", "Note created.", |vault| {
        Ok(vault.notes().create_note(title, content)?.id)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn note_update(id: String, title: String, content: String) -> ActionResponse {
    action("note_update", "Note saved.", |vault| {
        Ok(vault.notes().update_note(id.as_str(), title, content)?.id)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn note_toggle_pin(id: String) -> ActionResponse {
    action("note_toggle_pin", "Note updated.", |vault| {
        Ok(vault.notes().toggle_pin(id.as_str())?.id)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn note_delete(id: String) -> ActionResponse {
    action("note_delete", "Note deleted.", |vault| {
        Ok(vault.notes().delete_note(id.as_str())?.id)
    })
}

/// Share string for one note; `envelope` selects the versioned format.
#[flutter_rust_bridge::frb(sync)]
pub fn note_share(id: String, envelope: bool) -> TextResponse {
    let result = with_vault(|vault| {
        vault
            .notes()
            .share_note(id.as_str(), share_format(envelope))
            .map_err(|err| err.to_string())
    })
    .and_then(|inner| inner);
    TextResponse::from_result("note_share", result)
}

#[flutter_rust_bridge::frb(sync)]
pub fn lists_all() -> Vec<ListSummary> {
    with_vault(|vault| vault.lists().list_lists())
        .map(|lists| {
            lists
                .into_iter()
                .map(|list| {
                    let (checked, total) = list.progress();
                    ListSummary {
                        id: list.id,
                        title: list.title,
                        checked: clamp_u32(checked),
                        total: clamp_u32(total),
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

#[flutter_rust_bridge::frb(sync)]
pub fn list_create(title: String) -> ActionResponse {
    action("list_create", "List created.", |vault| {
        Ok(vault.lists().create_list(title.as_str())?.id)
    })
}

/// Adds an item; the response id is the new item's id.
#[flutter_rust_bridge::frb(sync)]
pub fn list_add_item(list_id: String, text: String) -> ActionResponse {
    action("list_add_item", "Item added.", |vault| {
        Ok(vault.lists().add_item(list_id.as_str(), text.as_str())?.id)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn list_toggle_item(list_id: String, item_id: String) -> ActionResponse {
    action("list_toggle_item", "Item updated.", |vault| {
        Ok(vault
            .lists()
            .toggle_item(list_id.as_str(), item_id.as_str())?
            .id)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn list_delete(list_id: String) -> ActionResponse {
    action("list_delete", "List deleted.", |vault| {
        Ok(vault.lists().delete_list(list_id.as_str())?.id)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn list_share(list_id: String, envelope: bool) -> TextResponse {
    let result = with_vault(|vault| {
        vault
            .lists()
            .share_list(list_id.as_str(), share_format(envelope))
            .map_err(|err| err.to_string())
    })
    .and_then(|inner| inner);
    TextResponse::from_result("list_share", result)
}

#[flutter_rust_bridge::frb(sync)]
pub fn passwords_list() -> Vec<PasswordItem> {
    with_vault(|vault| vault.passwords().list_passwords())
        .map(|entries| {
            entries
                .into_iter()
                .map(|entry| PasswordItem {
                    id: entry.id,
                    title: entry.title,
                    username: entry.username,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[flutter_rust_bridge::frb(sync)]
pub fn password_add(
    title: String,
    password: String,
    username: Option<String>,
    url: Option<String>,
) -> ActionResponse {
    let draft = PasswordDraft {
        title,
        password,
        username,
        url,
        notes: None,
    };
    action("password_add", "Password saved.", |vault| {
        Ok(vault.passwords().add_password(draft)?.id)
    })
}

/// Returns the stored secret, or `None` for unknown ids.
#[flutter_rust_bridge::frb(sync)]
pub fn password_reveal(id: String) -> Option<String> {
    with_vault(|vault| vault.passwords().get_password(id.as_str()))
        .ok()
        .flatten()
        .map(|entry| entry.password)
}

#[flutter_rust_bridge::frb(sync)]
pub fn password_delete(id: String) -> ActionResponse {
    action("password_delete", "Password deleted.", |vault| {
        Ok(vault.passwords().delete_password(id.as_str())?.id)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn reminder_schedule(
    title: String,
    due_epoch_ms: i64,
    record_id: Option<String>,
) -> ActionResponse {
    let Some(due_at) = from_epoch_millis(due_epoch_ms) else {
        return ActionResponse::failure("reminder_schedule failed: due time out of range");
    };
    action("reminder_schedule", "Reminder scheduled.", |vault| {
        Ok(vault
            .reminders()
            .schedule(title.as_str(), due_at, record_id)?
            .id)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn reminder_complete(id: String) -> ActionResponse {
    action("reminder_complete", "Reminder done.", |vault| {
        Ok(vault.reminders().complete(id.as_str())?.id)
    })
}

/// Open reminders due at or before `now_epoch_ms`.
#[flutter_rust_bridge::frb(sync)]
pub fn reminders_due(now_epoch_ms: i64) -> Vec<ReminderItem> {
    let Some(now) = from_epoch_millis(now_epoch_ms) else {
        return Vec::new();
    };
    with_vault(|vault| vault.reminders().due(now))
        .map(|reminders| {
            reminders
                .into_iter()
                .map(|reminder| ReminderItem {
                    id: reminder.id,
                    title: reminder.title,
                    due_at: reminder.due_at,
                    record_id: reminder.record_id,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Imports a share string or full export.
#[flutter_rust_bridge::frb(sync)]
pub fn import_text(text: String) -> ImportResponse {
    let result = with_vault(|vault| vault.import(text.as_str()).map_err(|err| err.to_string()))
        .and_then(|inner| inner);
    match result {
        Ok(summary) => ImportResponse {
            ok: true,
            notes: clamp_u32(summary.notes),
            lists: clamp_u32(summary.lists),
            reminders: clamp_u32(summary.reminders),
            passwords: clamp_u32(summary.passwords),
            message: format!("Imported {} record(s).", summary.total()),
        },
        Err(err) => ImportResponse {
            ok: false,
            notes: 0,
            lists: 0,
            reminders: 0,
            passwords: 0,
            message: format!("import_text failed: {err}"),
        },
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn export_json(include_passwords: bool) -> TextResponse {
    let result = with_vault(|vault| {
        vault
            .export_json(ExportOptions { include_passwords })
            .map_err(|err| err.to_string())
    })
    .and_then(|inner| inner);
    TextResponse::from_result("export_json", result)
}

#[flutter_rust_bridge::frb(sync)]
pub fn export_text() -> TextResponse {
    TextResponse::from_result("export_text", with_vault(|vault| vault.export_text()))
}

#[flutter_rust_bridge::frb(sync)]
pub fn pin_enabled() -> bool {
    with_vault(|vault| vault.lock().is_enabled()).unwrap_or(false)
}

#[flutter_rust_bridge::frb(sync)]
pub fn pin_set(pin: String) -> ActionResponse {
    lock_action("pin_set", "PIN set.", |vault| vault.lock().set_pin(pin.as_str()))
}

/// Checks a PIN; a vault without PIN always verifies.
#[flutter_rust_bridge::frb(sync)]
pub fn pin_verify(pin: String) -> ActionResponse {
    lock_action("pin_verify", "Unlocked.", |vault| vault.lock().verify(pin.as_str()))
}

#[flutter_rust_bridge::frb(sync)]
pub fn pin_clear(current_pin: String) -> ActionResponse {
    lock_action("pin_clear", "PIN removed.", |vault| {
        vault.lock().clear(current_pin.as_str())
    })
}

/// Registered sync provider ids, sorted.
#[flutter_rust_bridge::frb(sync)]
pub fn sync_providers() -> Vec<String> {
    with_vault(|vault| vault.provider_ids()).unwrap_or_default()
}

/// Mirrors notes and lists through `provider_id`, replacing any live
/// attachment. Local records the provider lacks are uploaded.
#[flutter_rust_bridge::frb(sync)]
pub fn sync_attach(provider_id: String) -> ActionResponse {
    let result = with_vault(|vault| {
        let mut slot = sync_slot();
        *slot = None;
        let sync = vault
            .attach_sync(provider_id.as_str())
            .map_err(|err| err.to_string())?;
        let id = sync.provider_id().to_string();
        *slot = Some(sync);
        Ok(id)
    })
    .and_then(|inner| inner);
    match result {
        Ok(id) => ActionResponse::success("Sync attached.", Some(id)),
        Err(err) => ActionResponse::failure(format!("sync_attach failed: {err}")),
    }
}

/// Stops syncing and forgets the persisted provider; local data stays.
#[flutter_rust_bridge::frb(sync)]
pub fn sync_detach() -> ActionResponse {
    let result = with_vault(|vault| {
        let Some(sync) = sync_slot().take() else {
            return Err("sync is not attached".to_string());
        };
        let id = sync.provider_id().to_string();
        vault.detach_sync(sync).map_err(|err| err.to_string())?;
        Ok(id)
    })
    .and_then(|inner| inner);
    match result {
        Ok(id) => ActionResponse::success("Sync detached.", Some(id)),
        Err(err) => ActionResponse::failure(format!("sync_detach failed: {err}")),
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn sync_status() -> SyncStatus {
    // Opening the vault may resume a persisted attachment.
    if with_vault(|_| ()).is_err() {
        return SyncStatus {
            attached: false,
            provider_id: None,
            pending: 0,
        };
    }
    match sync_slot().as_ref() {
        Some(sync) => SyncStatus {
            attached: true,
            provider_id: Some(sync.provider_id().to_string()),
            pending: clamp_u32(sync.pending_count()),
        },
        None => SyncStatus {
            attached: false,
            provider_id: None,
            pending: 0,
        },
    }
}

/// Retries uploading records whose earlier publish failed.
#[flutter_rust_bridge::frb(sync)]
pub fn sync_publish_pending() -> ActionResponse {
    match sync_slot().as_ref() {
        Some(sync) => {
            let uploaded = sync.publish_pending();
            ActionResponse::success(
                format!("Uploaded {uploaded} record(s)."),
                Some(sync.provider_id().to_string()),
            )
        }
        None => ActionResponse::failure("sync_publish_pending failed: sync is not attached"),
    }
}

fn sync_slot() -> MutexGuard<'static, Option<VaultSync>> {
    SYNC.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registers the built-in provider and reattaches the persisted one.
fn start_sync(vault: &Vault) {
    if let Err(err) = vault.register_provider(Arc::new(MemoryCloud::new(LOCAL_CLOUD_ID))) {
        warn!("event=sync_register module=ffi status=error error={err}");
        return;
    }
    match vault.resume_sync() {
        Ok(Some(sync)) => {
            info!(
                "event=sync_resume module=ffi status=ok provider={}",
                sync.provider_id()
            );
            *sync_slot() = Some(sync);
        }
        Ok(None) => {}
        Err(err) => warn!("event=sync_resume module=ffi status=error error={err}"),
    }
}

fn share_format(envelope: bool) -> ShareFormat {
    if envelope {
        ShareFormat::Envelope
    } else {
        ShareFormat::Legacy
    }
}

fn clamp_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn to_note_item(note: vault_core::Note) -> NoteItem {
    NoteItem {
        preview: derive_preview(&note.content),
        id: note.id,
        title: note.title,
        pinned: note.pinned,
        updated_at: note.updated_at,
    }
}

fn action(
    op: &str,
    success: &str,
    f: impl FnOnce(&Vault) -> vault_core::ServiceResult<String>,
) -> ActionResponse {
    match with_vault(|vault| f(vault).map_err(|err| err.to_string())).and_then(|inner| inner) {
        Ok(id) => ActionResponse::success(success, Some(id)),
        Err(err) => ActionResponse::failure(format!("{op} failed: {err}")),
    }
}

fn lock_action(
    op: &str,
    success: &str,
    f: impl FnOnce(&Vault) -> Result<(), vault_core::LockError>,
) -> ActionResponse {
    match with_vault(|vault| f(vault).map_err(|err| err.to_string())).and_then(|inner| inner) {
        Ok(()) => ActionResponse::success(success, None),
        Err(err) => ActionResponse::failure(format!("{op} failed: {err}")),
    }
}

fn resolve_db_path() -> PathBuf {
    VAULT_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("VAULT_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(VAULT_DB_FILE_NAME)
        })
        .clone()
}

fn with_vault<R>(f: impl FnOnce(&Vault) -> R) -> Result<R, String> {
    let vault = VAULT.get_or_init(|| {
        let db_path = resolve_db_path();
        let opened = SqliteStorage::open(&db_path)
            .map_err(|err| err.to_string())
            .and_then(|storage| Vault::open(Arc::new(storage)).map_err(|err| err.to_string()));
        match opened {
            Ok(vault) => {
                info!("event=vault_open module=ffi status=ok path={}", db_path.display());
                start_sync(&vault);
                Ok(vault)
            }
            Err(err) => {
                error!("event=vault_open module=ffi status=error error={err}");
                Err(format!("vault open failed: {err}"))
            }
        }
    });
    match vault {
        Ok(vault) => Ok(f(vault)),
        Err(err) => Err(err.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, import_text, init_logging, list_add_item, list_create, list_share,
        list_toggle_item, lists_all, note_create, note_delete, note_share, notes_search,
        password_add, password_reveal, passwords_list, ping, reminder_schedule, reminders_due,
        sync_attach, sync_detach, sync_providers, sync_publish_pending, sync_status,
    };
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn created_note_is_searchable_and_shareable() {
        let token = unique_token("ffi-note");
        let created = note_create(token.clone(), "body".to_string());
        assert!(created.ok, "{}", created.message);
        let id = created.id.expect("created note should return id");

        let hits = notes_search(token.clone());
        assert!(hits.iter().any(|item| item.id == id));

        let shared = note_share(id.clone(), false);
        assert!(shared.ok, "{}", shared.message);
        assert!(shared.text.starts_with("NOTE:"));

        let imported = import_text(shared.text);
        assert!(imported.ok, "{}", imported.message);
        assert_eq!(imported.notes, 1);
        assert_eq!(notes_search(token).len(), 2);

        assert!(note_delete(id).ok);
    }

    #[test]
    fn list_items_toggle_and_share_as_envelope() {
        let created = list_create(unique_token("ffi-list"));
        assert!(created.ok, "{}", created.message);
        let list_id = created.id.unwrap();

        let item = list_add_item(list_id.clone(), "Milk".to_string());
        assert!(item.ok, "{}", item.message);
        assert!(list_toggle_item(list_id.clone(), item.id.unwrap()).ok);

        let summary = lists_all()
            .into_iter()
            .find(|list| list.id == list_id)
            .expect("created list should be listed");
        assert_eq!((summary.checked, summary.total), (1, 1));

        let shared = list_share(list_id, true);
        assert!(shared.text.contains("\"kind\":\"list\""));
    }

    #[test]
    fn password_rows_hide_secret_until_revealed() {
        let title = unique_token("ffi-password");
        let created = password_add(title.clone(), "s3cret".to_string(), None, None);
        assert!(created.ok, "{}", created.message);
        let id = created.id.unwrap();

        assert!(passwords_list().iter().any(|item| item.title == title));
        assert_eq!(password_reveal(id).as_deref(), Some("s3cret"));

        let rejected = password_add("   ".to_string(), "x".to_string(), None, None);
        assert!(!rejected.ok);
    }

    #[test]
    fn reminders_due_uses_epoch_millis() {
        let title = unique_token("ffi-reminder");
        let scheduled = reminder_schedule(title.clone(), 1_000, None);
        assert!(scheduled.ok, "{}", scheduled.message);

        assert!(reminders_due(2_000).iter().any(|item| item.title == title));
        assert!(!reminders_due(500).iter().any(|item| item.title == title));
        assert!(!reminder_schedule("bad".to_string(), i64::MAX, None).ok);
    }

    #[test]
    fn sync_attaches_and_detaches_through_builtin_provider() {
        assert!(sync_providers().iter().any(|id| id == "memory"));
        assert!(!sync_attach("missing".to_string()).ok);

        let attached = sync_attach("memory".to_string());
        assert!(attached.ok, "{}", attached.message);
        assert_eq!(attached.id.as_deref(), Some("memory"));

        let created = note_create(unique_token("ffi-sync"), String::new());
        assert!(created.ok, "{}", created.message);
        let status = sync_status();
        assert!(status.attached);
        assert_eq!(status.provider_id.as_deref(), Some("memory"));
        assert_eq!(status.pending, 0);
        assert!(sync_publish_pending().ok);

        assert!(sync_detach().ok);
        assert!(!sync_status().attached);
        assert!(!sync_detach().ok);
        assert!(!sync_publish_pending().ok);
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
