//! Note use-case service.
//!
//! # Responsibility
//! - Provide note create/update/pin/delete/list/search APIs.
//! - Derive plain text and preview projections from rich-text content.
//! - Import and share single notes.
//!
//! # Invariants
//! - New and imported notes are prepended with a fresh id.
//! - Note list is sorted pinned first, then `updated_at` DESC.

use super::{ServiceError, ServiceResult};
use crate::model::note::Note;
use crate::model::timestamp::now_timestamp;
use crate::model::RecordKind;
use crate::repo::RecordCollection;
use crate::share::{
    decode_import, encode_share, ImportPayload, ShareFormat, SharePayload, SharedNote,
};
use crate::store::Store;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Reverse;

const PREVIEW_MAX_CHARS: usize = 100;

static BLOCK_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*(br|/p|/div|/li|/h[1-6])\s*/?>").expect("valid block tag regex")
});
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static INLINE_WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid ws regex"));
static BLANK_LINES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n+").expect("valid blank line regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Note service facade over the `notes` collection.
#[derive(Clone)]
pub struct NoteService {
    notes: RecordCollection<Note>,
}

impl NoteService {
    pub fn open(store: &Store) -> ServiceResult<Self> {
        Ok(Self {
            notes: RecordCollection::open(store)?,
        })
    }

    pub fn collection(&self) -> &RecordCollection<Note> {
        &self.notes
    }

    /// Creates one note; a note needs a title or some content.
    pub fn create_note(
        &self,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> ServiceResult<Note> {
        let (title, content) = validate_note(title.into(), content.into())?;
        let now = now_timestamp();
        let note = Note {
            id: String::new(),
            title,
            content,
            created_at: now.clone(),
            updated_at: now,
            pinned: false,
        };
        Ok(self.notes.insert_front(note)?)
    }

    /// Replaces title and content fully and bumps `updated_at`.
    pub fn update_note(
        &self,
        id: &str,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> ServiceResult<Note> {
        let (title, content) = validate_note(title.into(), content.into())?;
        Ok(self.notes.modify(id, |note| {
            note.title = title;
            note.content = content;
            note.updated_at = now_timestamp();
        })?)
    }

    pub fn toggle_pin(&self, id: &str) -> ServiceResult<Note> {
        Ok(self.notes.modify(id, |note| note.pinned = !note.pinned)?)
    }

    pub fn delete_note(&self, id: &str) -> ServiceResult<Note> {
        Ok(self.notes.remove(id)?)
    }

    pub fn get_note(&self, id: &str) -> Option<Note> {
        self.notes.get(id)
    }

    /// Lists notes pinned first, then most recently updated. Notes whose
    /// `updated_at` does not parse sort last.
    pub fn list_notes(&self) -> Vec<Note> {
        let mut notes = self.notes.all();
        notes.sort_by_key(|note| (Reverse(note.pinned), Reverse(note.updated_at().ok())));
        notes
    }

    /// Case-insensitive match on title and plain-text content.
    pub fn search_notes(&self, query: &str) -> Vec<Note> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.list_notes();
        }
        self.list_notes()
            .into_iter()
            .filter(|note| {
                note.title.to_lowercase().contains(&needle)
                    || plain_text(&note.content).to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Adds a shared note as a new note.
    pub fn import_shared(&self, shared: SharedNote) -> ServiceResult<Note> {
        self.create_note(shared.title, shared.content)
    }

    /// Decodes `text` and imports it; only single-note payloads are accepted.
    pub fn import_text(&self, text: &str) -> ServiceResult<Note> {
        match decode_import(text)? {
            ImportPayload::Note(shared) => self.import_shared(shared),
            _ => Err(ServiceError::InvalidInput(
                "expected a shared note".to_string(),
            )),
        }
    }

    /// Encodes one note for sharing.
    pub fn share_note(&self, id: &str, format: ShareFormat) -> ServiceResult<String> {
        let note = self.notes.get(id).ok_or_else(|| ServiceError::NotFound {
            kind: RecordKind::Note,
            id: id.to_string(),
        })?;
        let payload = SharePayload::Note(SharedNote {
            title: note.title,
            content: note.content,
        });
        encode_share(&payload, format)
            .map_err(|err| ServiceError::InvalidInput(format!("note cannot be shared: {err}")))
    }
}

fn validate_note(title: String, content: String) -> ServiceResult<(String, String)> {
    let title = title.trim().to_string();
    if title.is_empty() && plain_text(&content).is_empty() {
        return Err(ServiceError::InvalidInput(
            "note needs a title or content".to_string(),
        ));
    }
    Ok((title, content))
}

/// Converts editor rich text to plain text.
///
/// Block-level tags become line breaks, other tags are dropped, common
/// entities are decoded and runs of blank lines collapse to one.
pub fn plain_text(content: &str) -> String {
    let with_breaks = BLOCK_TAG_RE.replace_all(content, "\n");
    let without_tags = HTML_TAG_RE.replace_all(&with_breaks, "");
    let decoded = decode_entities(&without_tags);
    let collapsed = INLINE_WS_RE.replace_all(&decoded, " ");
    let lines: Vec<&str> = collapsed.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    BLANK_LINES_RE
        .replace_all(joined.trim(), "\n")
        .into_owned()
}

/// Single-line preview of note content, capped at 100 chars.
pub fn derive_preview(content: &str) -> Option<String> {
    let text = plain_text(content);
    let normalized = WHITESPACE_RE.replace_all(&text, " ");
    let trimmed = normalized.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(PREVIEW_MAX_CHARS).collect())
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
