use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use vault_core::service::password_service::PasswordDraft;
use vault_core::storage::KeyValueStorage;
use vault_core::{MemoryStorage, RecordKind, ServiceError, Store, Vault};

fn draft(title: &str, username: Option<&str>) -> PasswordDraft {
    PasswordDraft {
        title: title.to_string(),
        password: "pa55".to_string(),
        username: username.map(str::to_string),
        url: None,
        notes: None,
    }
}

#[test]
fn notes_list_pinned_first_then_recent() {
    let vault = Vault::in_memory().unwrap();
    let notes = vault.notes();
    let a = notes.create_note("A", "").unwrap();
    let b = notes.create_note("B", "").unwrap();
    let c = notes.create_note("C", "").unwrap();

    notes.toggle_pin(&a.id).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    notes.update_note(&b.id, "B2", "edited").unwrap();

    let order: Vec<String> = notes.list_notes().into_iter().map(|note| note.id).collect();
    assert_eq!(order, vec![a.id, b.id, c.id]);
}

#[test]
fn note_search_matches_plain_text_case_insensitively() {
    let vault = Vault::in_memory().unwrap();
    let notes = vault.notes();
    notes.create_note("Groceries", "<p>Buy <b>Oat</b> milk</p>").unwrap();
    notes.create_note("Work", "standup at nine").unwrap();

    assert_eq!(notes.search_notes("oat MILK").len(), 1);
    assert_eq!(notes.search_notes("groc").len(), 1);
    assert!(notes.search_notes("absent").is_empty());
}

#[test]
fn empty_note_is_rejected_without_writing() {
    let storage = Arc::new(MemoryStorage::new());
    let vault = Vault::open(storage.clone()).unwrap();

    let err = vault.notes().create_note("  ", "<p> </p>").unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
    assert_eq!(storage.get("notes").unwrap(), None);
}

#[test]
fn missing_note_reports_kind_and_id() {
    let vault = Vault::in_memory().unwrap();
    match vault.notes().delete_note("nope").unwrap_err() {
        ServiceError::NotFound { kind, id } => {
            assert_eq!(kind, RecordKind::Note);
            assert_eq!(id, "nope");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn list_items_lifecycle() {
    let vault = Vault::in_memory().unwrap();
    let lists = vault.lists();
    let list = lists.create_list("Groceries").unwrap();

    let milk = lists.add_item(&list.id, "Milk").unwrap();
    let eggs = lists.add_item(&list.id, "Eggs").unwrap();
    lists.add_item(&list.id, "Bread").unwrap();
    assert_ne!(milk.id, eggs.id);

    lists.toggle_item(&list.id, &milk.id).unwrap();
    lists.toggle_item(&list.id, &eggs.id).unwrap();
    assert_eq!(lists.get_list(&list.id).unwrap().progress(), (2, 3));

    assert_eq!(lists.clear_checked(&list.id).unwrap(), 2);
    let remaining = lists.get_list(&list.id).unwrap();
    assert_eq!(remaining.items.len(), 1);
    assert_eq!(remaining.items[0].text, "Bread");

    let renamed = lists.rename_list(&list.id, "Weekend").unwrap();
    assert_eq!(renamed.title, "Weekend");

    assert!(lists.add_item(&list.id, "   ").is_err());
    assert!(lists.toggle_item(&list.id, "missing").is_err());

    lists.delete_list(&list.id).unwrap();
    assert!(lists.list_lists().is_empty());
}

#[test]
fn passwords_validate_sort_and_search() {
    let vault = Vault::in_memory().unwrap();
    let passwords = vault.passwords();

    assert!(matches!(
        passwords.add_password(draft("", None)),
        Err(ServiceError::InvalidInput(_))
    ));
    let mut no_secret = draft("Bank", None);
    no_secret.password = String::new();
    assert!(passwords.add_password(no_secret).is_err());

    passwords.add_password(draft("zeta mail", Some("me@zeta"))).unwrap();
    let bank = passwords.add_password(draft("Bank", Some("alice"))).unwrap();

    let titles: Vec<String> = passwords
        .list_passwords()
        .into_iter()
        .map(|entry| entry.title)
        .collect();
    assert_eq!(titles, vec!["Bank", "zeta mail"]);

    let hits = passwords.search_passwords("ALICE");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, bank.id);

    let updated = passwords
        .update_password(&bank.id, draft("Bank", Some("bob")))
        .unwrap();
    assert_eq!(updated.username.as_deref(), Some("bob"));
    assert_eq!(updated.created_at, bank.created_at);
}

#[test]
fn reminders_due_filters_by_parsed_time_and_skips_garbage() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert_raw(
        "reminders",
        r#"[{"id":"bad","title":"Broken","dueAt":"someday"}]"#,
    );
    let vault = Vault::open(storage).unwrap();
    let reminders = vault.reminders();

    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let past = reminders
        .schedule("Call", now - Duration::hours(1), Some("note-1".to_string()))
        .unwrap();
    let future = reminders
        .schedule("Later", now + Duration::hours(1), None)
        .unwrap();
    let done = reminders
        .schedule("Done", now - Duration::hours(2), None)
        .unwrap();
    reminders.complete(&done.id).unwrap();

    let due: Vec<String> = reminders.due(now).into_iter().map(|r| r.id).collect();
    assert_eq!(due, vec![past.id.clone()]);

    reminders
        .reschedule(&future.id, now - Duration::minutes(5))
        .unwrap();
    let due: Vec<String> = reminders.due(now).into_iter().map(|r| r.id).collect();
    assert_eq!(due, vec![past.id, future.id]);

    assert_eq!(reminders.list_reminders().last().unwrap().id, "bad");
}

#[test]
fn vault_reopened_over_same_storage_sees_writes() {
    let store = Store::in_memory();
    let first = Vault::open(store.storage()).unwrap();
    let note = first.notes().create_note("Shared", "").unwrap();

    let second = Vault::open(store.storage()).unwrap();
    assert_eq!(second.notes().get_note(&note.id).unwrap().title, "Shared");
}
