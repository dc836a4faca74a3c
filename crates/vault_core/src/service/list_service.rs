//! Shopping list use-case service.
//!
//! # Invariants
//! - Item ids are unique within their list.
//! - Every list mutation bumps the list's `updated_at`.

use super::{require_text, ServiceError, ServiceResult};
use crate::model::list::{ListItem, ShoppingList};
use crate::model::timestamp::now_timestamp;
use crate::model::RecordKind;
use crate::repo::{fresh_id, RecordCollection};
use crate::share::{
    decode_import, encode_share, ImportPayload, ShareFormat, SharePayload, SharedList,
    SharedListItem,
};
use crate::store::Store;

#[derive(Clone)]
pub struct ListService {
    lists: RecordCollection<ShoppingList>,
}

impl ListService {
    pub fn open(store: &Store) -> ServiceResult<Self> {
        Ok(Self {
            lists: RecordCollection::open(store)?,
        })
    }

    pub fn collection(&self) -> &RecordCollection<ShoppingList> {
        &self.lists
    }

    pub fn create_list(&self, title: &str) -> ServiceResult<ShoppingList> {
        let title = require_text("list title", title)?;
        let now = now_timestamp();
        Ok(self.lists.insert_front(ShoppingList {
            id: String::new(),
            title,
            items: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        })?)
    }

    pub fn rename_list(&self, list_id: &str, title: &str) -> ServiceResult<ShoppingList> {
        let title = require_text("list title", title)?;
        Ok(self.lists.modify(list_id, |list| {
            list.title = title;
            list.updated_at = now_timestamp();
        })?)
    }

    pub fn delete_list(&self, list_id: &str) -> ServiceResult<ShoppingList> {
        Ok(self.lists.remove(list_id)?)
    }

    pub fn get_list(&self, list_id: &str) -> Option<ShoppingList> {
        self.lists.get(list_id)
    }

    /// Lists in stored order (most recently created first).
    pub fn list_lists(&self) -> Vec<ShoppingList> {
        self.lists.all()
    }

    /// Appends one unchecked item and returns it.
    pub fn add_item(&self, list_id: &str, text: &str) -> ServiceResult<ListItem> {
        let text = require_text("item text", text)?;
        let (_, item) = self.lists.try_modify(list_id, |list| {
            let item = ListItem {
                id: fresh_id(|candidate| list.items.iter().any(|item| item.id == candidate)),
                text,
                checked: false,
            };
            list.items.push(item.clone());
            list.updated_at = now_timestamp();
            Ok::<_, ServiceError>(item)
        })?;
        Ok(item)
    }

    pub fn toggle_item(&self, list_id: &str, item_id: &str) -> ServiceResult<ShoppingList> {
        let (list, ()) = self.lists.try_modify(list_id, |list| {
            let item = list
                .items
                .iter_mut()
                .find(|item| item.id == item_id)
                .ok_or_else(|| item_not_found(list_id, item_id))?;
            item.checked = !item.checked;
            list.updated_at = now_timestamp();
            Ok::<_, ServiceError>(())
        })?;
        Ok(list)
    }

    pub fn remove_item(&self, list_id: &str, item_id: &str) -> ServiceResult<ShoppingList> {
        let (list, ()) = self.lists.try_modify(list_id, |list| {
            let index = list
                .items
                .iter()
                .position(|item| item.id == item_id)
                .ok_or_else(|| item_not_found(list_id, item_id))?;
            list.items.remove(index);
            list.updated_at = now_timestamp();
            Ok::<_, ServiceError>(())
        })?;
        Ok(list)
    }

    /// Drops every checked item; returns how many were removed.
    pub fn clear_checked(&self, list_id: &str) -> ServiceResult<usize> {
        let (_, removed) = self.lists.try_modify(list_id, |list| {
            let before = list.items.len();
            list.items.retain(|item| !item.checked);
            let removed = before - list.items.len();
            if removed > 0 {
                list.updated_at = now_timestamp();
            }
            Ok::<_, ServiceError>(removed)
        })?;
        Ok(removed)
    }

    /// Adds a shared list as a new list with fresh item ids.
    pub fn import_shared(&self, shared: SharedList) -> ServiceResult<ShoppingList> {
        let title = require_text("list title", &shared.title)?;
        let mut items: Vec<ListItem> = Vec::with_capacity(shared.items.len());
        for shared_item in shared.items {
            let text = shared_item.text.trim().to_string();
            if text.is_empty() {
                continue;
            }
            let id = fresh_id(|candidate| items.iter().any(|item| item.id == candidate));
            items.push(ListItem {
                id,
                text,
                checked: shared_item.checked,
            });
        }

        let now = now_timestamp();
        Ok(self.lists.insert_front(ShoppingList {
            id: String::new(),
            title,
            items,
            created_at: now.clone(),
            updated_at: now,
        })?)
    }

    /// Decodes `text` and imports it; only single-list payloads are accepted.
    pub fn import_text(&self, text: &str) -> ServiceResult<ShoppingList> {
        match decode_import(text)? {
            ImportPayload::List(shared) => self.import_shared(shared),
            _ => Err(ServiceError::InvalidInput(
                "expected a shared list".to_string(),
            )),
        }
    }

    pub fn share_list(&self, list_id: &str, format: ShareFormat) -> ServiceResult<String> {
        let list = self.lists.get(list_id).ok_or_else(|| ServiceError::NotFound {
            kind: RecordKind::List,
            id: list_id.to_string(),
        })?;
        let payload = SharePayload::List(SharedList {
            title: list.title,
            items: list
                .items
                .into_iter()
                .map(|item| SharedListItem {
                    text: item.text,
                    checked: item.checked,
                })
                .collect(),
        });
        encode_share(&payload, format)
            .map_err(|err| ServiceError::InvalidInput(format!("list cannot be shared: {err}")))
    }
}

fn item_not_found(list_id: &str, item_id: &str) -> ServiceError {
    ServiceError::NotFound {
        kind: RecordKind::List,
        id: format!("{list_id}/{item_id}"),
    }
}
