//! Stored password use-case service.
//!
//! # Invariants
//! - Title and password are non-blank.
//! - Secrets never reach logs; only ids and counts are logged.

use super::{optional_text, require_text, ServiceError, ServiceResult};
use crate::model::password::PasswordEntry;
use crate::model::timestamp::now_timestamp;
use crate::repo::RecordCollection;
use crate::store::Store;

/// User input for creating or replacing a stored password.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordDraft {
    pub title: String,
    pub password: String,
    pub username: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct PasswordService {
    passwords: RecordCollection<PasswordEntry>,
}

impl PasswordService {
    pub fn open(store: &Store) -> ServiceResult<Self> {
        Ok(Self {
            passwords: RecordCollection::open(store)?,
        })
    }

    pub fn collection(&self) -> &RecordCollection<PasswordEntry> {
        &self.passwords
    }

    pub fn add_password(&self, draft: PasswordDraft) -> ServiceResult<PasswordEntry> {
        let validated = ValidDraft::try_from(draft)?;
        Ok(self.passwords.insert_front(PasswordEntry {
            id: String::new(),
            title: validated.title,
            password: validated.password,
            username: validated.username,
            url: validated.url,
            notes: validated.notes,
            created_at: Some(now_timestamp()),
        })?)
    }

    /// Replaces every editable field; `id` and `created_at` are kept.
    pub fn update_password(&self, id: &str, draft: PasswordDraft) -> ServiceResult<PasswordEntry> {
        let validated = ValidDraft::try_from(draft)?;
        Ok(self.passwords.modify(id, |entry| {
            entry.title = validated.title;
            entry.password = validated.password;
            entry.username = validated.username;
            entry.url = validated.url;
            entry.notes = validated.notes;
        })?)
    }

    pub fn delete_password(&self, id: &str) -> ServiceResult<PasswordEntry> {
        Ok(self.passwords.remove(id)?)
    }

    pub fn get_password(&self, id: &str) -> Option<PasswordEntry> {
        self.passwords.get(id)
    }

    /// All entries sorted by title, case-insensitive.
    pub fn list_passwords(&self) -> Vec<PasswordEntry> {
        let mut entries = self.passwords.all();
        entries.sort_by_key(|entry| entry.title.to_lowercase());
        entries
    }

    /// Case-insensitive match on title, username and url.
    pub fn search_passwords(&self, query: &str) -> Vec<PasswordEntry> {
        let needle = query.trim().to_lowercase();
        self.list_passwords()
            .into_iter()
            .filter(|entry| {
                needle.is_empty()
                    || entry.title.to_lowercase().contains(&needle)
                    || [&entry.username, &entry.url].into_iter().any(|field| {
                        field
                            .as_deref()
                            .is_some_and(|value| value.to_lowercase().contains(&needle))
                    })
            })
            .collect()
    }
}

struct ValidDraft {
    title: String,
    password: String,
    username: Option<String>,
    url: Option<String>,
    notes: Option<String>,
}

impl TryFrom<PasswordDraft> for ValidDraft {
    type Error = ServiceError;

    fn try_from(draft: PasswordDraft) -> Result<Self, Self::Error> {
        let title = require_text("title", &draft.title)?;
        if draft.password.is_empty() {
            return Err(ServiceError::InvalidInput(
                "password cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            title,
            password: draft.password,
            username: optional_text(draft.username),
            url: optional_text(draft.url),
            notes: optional_text(draft.notes),
        })
    }
}
