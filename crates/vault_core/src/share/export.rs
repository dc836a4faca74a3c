//! Full vault export (JSON) and plain text rendering.

use crate::model::list::ShoppingList;
use crate::model::note::Note;
use crate::model::password::PasswordEntry;
use crate::model::reminder::Reminder;
use crate::model::timestamp::now_timestamp;
use crate::service::note_service::plain_text;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Version written into new exports.
pub const EXPORT_VERSION: u32 = 1;

/// What an export includes beyond notes, lists and reminders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Stored credentials are left out unless explicitly requested.
    pub include_passwords: bool,
}

/// The app's own full export document.
///
/// Older exports carry only `notes`/`lists`; every field defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultExport {
    #[serde(default = "legacy_export_version")]
    pub version: u32,
    #[serde(default)]
    pub exported_at: String,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub lists: Vec<ShoppingList>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reminders: Vec<Reminder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passwords: Option<Vec<PasswordEntry>>,
}

impl VaultExport {
    pub fn new(
        notes: Vec<Note>,
        lists: Vec<ShoppingList>,
        reminders: Vec<Reminder>,
        passwords: Option<Vec<PasswordEntry>>,
    ) -> Self {
        Self {
            version: EXPORT_VERSION,
            exported_at: now_timestamp(),
            notes,
            lists,
            reminders,
            passwords,
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn legacy_export_version() -> u32 {
    0
}

/// Renders notes and lists as human-readable text.
///
/// Passwords are never rendered as text.
pub fn render_text_export(notes: &[Note], lists: &[ShoppingList]) -> String {
    let mut out = String::new();

    if !notes.is_empty() {
        out.push_str("# Notes\n");
        for note in notes {
            let _ = writeln!(out, "\n## {}", display_title(&note.title));
            let body = plain_text(&note.content);
            if !body.is_empty() {
                let _ = writeln!(out, "{body}");
            }
        }
    }

    if !lists.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("# Lists\n");
        for list in lists {
            let (checked, total) = list.progress();
            let _ = writeln!(
                out,
                "\n## {} ({checked}/{total})",
                display_title(&list.title)
            );
            for item in &list.items {
                let mark = if item.checked { 'x' } else { ' ' };
                let _ = writeln!(out, "[{mark}] {}", item.text);
            }
        }
    }

    out
}

fn display_title(title: &str) -> &str {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        "Untitled"
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::{render_text_export, VaultExport};
    use crate::model::list::{ListItem, ShoppingList};
    use crate::model::note::Note;

    fn groceries() -> ShoppingList {
        ShoppingList {
            id: "l1".to_string(),
            title: "Groceries".to_string(),
            items: vec![
                ListItem {
                    id: "i1".to_string(),
                    text: "Milk".to_string(),
                    checked: true,
                },
                ListItem {
                    id: "i2".to_string(),
                    text: "Eggs".to_string(),
                    checked: false,
                },
            ],
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn text_export_marks_checked_items() {
        let note = Note {
            id: "n1".to_string(),
            title: "  ".to_string(),
            content: "<p>Hello <b>world</b></p>".to_string(),
            created_at: String::new(),
            updated_at: String::new(),
            pinned: false,
        };
        let text = render_text_export(&[note], &[groceries()]);

        assert!(text.contains("## Untitled\nHello world\n"));
        assert!(text.contains("## Groceries (1/2)"));
        assert!(text.contains("[x] Milk"));
        assert!(text.contains("[ ] Eggs"));
    }

    #[test]
    fn export_omits_passwords_when_not_requested() {
        let export = VaultExport::new(Vec::new(), vec![groceries()], Vec::new(), None);
        let json = export.to_json_pretty().unwrap();
        assert!(!json.contains("passwords"));
        assert!(json.contains("\"exportedAt\""));

        let parsed: VaultExport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, export);
    }
}
