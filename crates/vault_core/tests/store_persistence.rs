use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use vault_core::model::password::PasswordEntry;
use vault_core::storage::StorageResult;
use vault_core::{KeyValueStorage, MemoryStorage, SqliteStorage, Store, Vault};

/// Memory storage that counts calls reaching the backend.
#[derive(Default)]
struct CountingStorage {
    inner: MemoryStorage,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl KeyValueStorage for CountingStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value)
    }

    fn clear(&self) -> StorageResult<()> {
        self.inner.clear()
    }
}

#[test]
fn last_write_survives_reopen() {
    let storage: Arc<dyn KeyValueStorage> = Arc::new(MemoryStorage::new());

    let binding = Store::new(Arc::clone(&storage))
        .open("draft", String::new())
        .unwrap();
    binding.set("first".to_string()).unwrap();
    binding.set("second".to_string()).unwrap();

    let reopened = Store::new(storage).open("draft", String::new()).unwrap();
    assert_eq!(reopened.value(), "second");
}

#[test]
fn absent_entry_yields_default_without_writing() {
    let storage = Arc::new(CountingStorage::default());
    let store = Store::new(storage.clone());

    let binding = store.open("tags", vec!["inbox".to_string()]).unwrap();
    assert_eq!(binding.value(), vec!["inbox".to_string()]);
    let _again = store.open("tags", vec!["other".to_string()]).unwrap();

    assert_eq!(storage.sets.load(Ordering::SeqCst), 0);
    assert_eq!(storage.gets.load(Ordering::SeqCst), 1);
    assert_eq!(storage.inner.get("tags").unwrap(), None);

    binding.set(vec!["work".to_string()]).unwrap();
    assert_eq!(storage.sets.load(Ordering::SeqCst), 1);
}

#[test]
fn corrupted_entry_yields_default() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert_raw("notes", "{not json");
    let store = Store::new(storage);

    let binding = store.open("notes", Vec::<String>::new()).unwrap();
    assert!(binding.value().is_empty());
}

#[test]
fn back_to_back_updates_do_not_lose_writes() {
    let store = Store::in_memory();
    let counter = store.open("counter", 0_i64).unwrap();

    counter.update(|prev| prev + 1).unwrap();
    counter.update(|prev| prev + 1).unwrap();
    assert_eq!(counter.value(), 2);
}

#[test]
fn concurrent_updates_from_many_bindings_are_serialized() {
    let storage = Arc::new(MemoryStorage::new());
    let store = Store::new(storage.clone());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let binding = store.open("counter", 0_i64).unwrap();
            thread::spawn(move || {
                for _ in 0..50 {
                    binding.update(|prev| prev + 1).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.open("counter", 0_i64).unwrap().value(), 400);
    assert_eq!(storage.get("counter").unwrap().as_deref(), Some("400"));
}

#[test]
fn independent_bindings_observe_each_others_writes() {
    let store = Store::in_memory();
    let first = store.open("theme", "light".to_string()).unwrap();
    let second = store.open("theme", "light".to_string()).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let _subscription = {
        let seen = Arc::clone(&seen);
        first.subscribe(move |value: &String| seen.lock().unwrap().push(value.clone()))
    };

    second.set("dark".to_string()).unwrap();
    assert_eq!(first.value(), "dark");
    first.set("sepia".to_string()).unwrap();
    assert_eq!(second.value(), "sepia");
    assert_eq!(*seen.lock().unwrap(), vec!["dark", "sepia"]);
}

#[test]
fn passwords_survive_process_restart_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.sqlite3");

    {
        let store = Store::new(Arc::new(SqliteStorage::open(&path).unwrap()));
        let passwords = store.open("passwords", Vec::<PasswordEntry>::new()).unwrap();
        let entry: PasswordEntry =
            serde_json::from_value(json!({"id": "1", "title": "Email", "password": "x"})).unwrap();
        passwords.set(vec![entry]).unwrap();
    }

    let storage = Arc::new(SqliteStorage::open(&path).unwrap());
    assert_eq!(
        storage.get("passwords").unwrap().as_deref(),
        Some(r#"[{"id":"1","title":"Email","password":"x"}]"#)
    );

    let store = Store::new(storage);
    let passwords = store.open("passwords", Vec::<PasswordEntry>::new()).unwrap();
    let loaded = serde_json::to_value(passwords.value()).unwrap();
    assert_eq!(
        loaded,
        json!([{"id": "1", "title": "Email", "password": "x"}])
    );
}

#[test]
fn shared_note_import_prepends_one_note_with_fresh_id() {
    let vault = Vault::in_memory().unwrap();
    let older = vault.notes().create_note("Older", "text").unwrap();
    let newer = vault.notes().create_note("Newer", "text").unwrap();

    let imported = vault
        .notes()
        .import_text("NOTE:{\"title\":\"Hi\",\"content\":\"Body\"}")
        .unwrap();

    let notes = vault.notes().collection().all();
    assert_eq!(notes.len(), 3);
    assert_eq!(notes[0].id, imported.id);
    assert_eq!(notes[0].title, "Hi");
    assert_eq!(notes[0].content, "Body");
    assert_ne!(imported.id, older.id);
    assert_ne!(imported.id, newer.id);
    assert_eq!(notes[1].id, newer.id);
    assert_eq!(notes[2].id, older.id);
}
