//! Free-form note record.

use super::timestamp::{parse_timestamp, TimestampError};
use super::{Record, RecordKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One note. `content` is the editor's rich text (HTML or plain text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub pinned: bool,
}

impl Note {
    pub fn created_at(&self) -> Result<DateTime<Utc>, TimestampError> {
        parse_timestamp(&self.created_at)
    }

    pub fn updated_at(&self) -> Result<DateTime<Utc>, TimestampError> {
        parse_timestamp(&self.updated_at)
    }
}

impl Record for Note {
    const KIND: RecordKind = RecordKind::Note;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
