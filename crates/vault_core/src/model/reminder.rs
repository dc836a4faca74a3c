//! Scheduled reminder record.
//!
//! Only the data lives here; platform notification scheduling consumes
//! `ReminderService::due` from the shell.

use super::timestamp::{parse_timestamp, TimestampError};
use super::{Record, RecordKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub title: String,
    /// RFC 3339; parse with `Reminder::due_at`.
    pub due_at: String,
    #[serde(default)]
    pub done: bool,
    /// Optional id of the note/list this reminder points at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl Reminder {
    pub fn due_at(&self) -> Result<DateTime<Utc>, TimestampError> {
        parse_timestamp(&self.due_at)
    }
}

impl Record for Reminder {
    const KIND: RecordKind = RecordKind::Reminder;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}
