//! Shopping list record.

use super::timestamp::{parse_timestamp, TimestampError};
use super::{Record, RecordKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of a shopping list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    #[serde(default)]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub checked: bool,
}

/// Shopping list; items keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingList {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub items: Vec<ListItem>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl ShoppingList {
    /// Returns `(checked, total)` item counts.
    pub fn progress(&self) -> (usize, usize) {
        let checked = self.items.iter().filter(|item| item.checked).count();
        (checked, self.items.len())
    }

    pub fn updated_at(&self) -> Result<DateTime<Utc>, TimestampError> {
        parse_timestamp(&self.updated_at)
    }
}

impl Record for ShoppingList {
    const KIND: RecordKind = RecordKind::List;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}
