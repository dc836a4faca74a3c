//! In-process cloud provider for tests and offline sessions.

use super::provider::{
    CloudDocument, CloudProvider, CloudSubscription, ProviderError, ProviderResult, SnapshotFn,
    SyncStage,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use uuid::Uuid;

type Subscribers = HashMap<String, Vec<(u64, SnapshotFn)>>;

/// Document store with snapshot listeners, newest documents first.
pub struct MemoryCloud {
    provider_id: String,
    inner: Arc<MemoryCloudInner>,
}

#[derive(Default)]
struct MemoryCloudInner {
    collections: Mutex<HashMap<String, Vec<CloudDocument>>>,
    subscribers: Mutex<Subscribers>,
    next_subscriber_id: AtomicU64,
}

impl MemoryCloud {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            inner: Arc::new(MemoryCloudInner::default()),
        }
    }

    /// Current documents of `collection`.
    pub fn documents(&self, collection: &str) -> Vec<CloudDocument> {
        self.inner.snapshot(collection)
    }

    fn error(&self, stage: SyncStage, code: &str, message: String) -> ProviderError {
        ProviderError::new(self.provider_id.as_str(), stage, code, message, false)
    }
}

impl MemoryCloudInner {
    fn lock_collections(&self) -> MutexGuard<'_, HashMap<String, Vec<CloudDocument>>> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self, collection: &str) -> Vec<CloudDocument> {
        self.lock_collections()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Delivers the current snapshot; callbacks run with no lock held.
    fn notify(&self, collection: &str) {
        let snapshot = self.snapshot(collection);
        let callbacks: Vec<SnapshotFn> = self
            .lock_subscribers()
            .get(collection)
            .map(|entries| entries.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();
        for callback in callbacks {
            callback(snapshot.clone());
        }
    }
}

impl CloudProvider for MemoryCloud {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn subscribe(
        &self,
        collection: &str,
        on_change: SnapshotFn,
    ) -> ProviderResult<CloudSubscription> {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .lock_subscribers()
            .entry(collection.to_string())
            .or_default()
            .push((id, Arc::clone(&on_change)));

        on_change(self.inner.snapshot(collection));

        let inner: Weak<MemoryCloudInner> = Arc::downgrade(&self.inner);
        let collection = collection.to_string();
        Ok(CloudSubscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                if let Some(entries) = inner.lock_subscribers().get_mut(&collection) {
                    entries.retain(|(entry_id, _)| *entry_id != id);
                }
            }
        }))
    }

    fn add(&self, collection: &str, mut document: CloudDocument) -> ProviderResult<String> {
        {
            let mut collections = self.inner.lock_collections();
            let documents = collections.entry(collection.to_string()).or_default();
            if document.id.trim().is_empty() {
                document.id = Uuid::new_v4().to_string();
            }
            if documents.iter().any(|existing| existing.id == document.id) {
                return Err(self.error(
                    SyncStage::Add,
                    "already_exists",
                    format!("document {} already exists in {collection}", document.id),
                ));
            }
            documents.insert(0, document.clone());
        }
        self.inner.notify(collection);
        Ok(document.id)
    }

    fn update(&self, collection: &str, document: CloudDocument) -> ProviderResult<()> {
        {
            let mut collections = self.inner.lock_collections();
            let existing = collections
                .get_mut(collection)
                .and_then(|documents| documents.iter_mut().find(|doc| doc.id == document.id))
                .ok_or_else(|| {
                    self.error(
                        SyncStage::Update,
                        "not_found",
                        format!("document {} not found in {collection}", document.id),
                    )
                })?;
            *existing = document;
        }
        self.inner.notify(collection);
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> ProviderResult<()> {
        {
            let mut collections = self.inner.lock_collections();
            let documents = collections.get_mut(collection);
            let index = documents
                .as_ref()
                .and_then(|documents| documents.iter().position(|doc| doc.id == id));
            match (documents, index) {
                (Some(documents), Some(index)) => {
                    documents.remove(index);
                }
                _ => {
                    return Err(self.error(
                        SyncStage::Delete,
                        "not_found",
                        format!("document {id} not found in {collection}"),
                    ));
                }
            }
        }
        self.inner.notify(collection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryCloud;
    use crate::sync::provider::{CloudDocument, CloudProvider};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn subscribers_get_initial_and_change_snapshots_until_dropped() {
        let cloud = MemoryCloud::new("memory");
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let subscription = {
            let sizes = Arc::clone(&sizes);
            cloud
                .subscribe(
                    "notes",
                    Arc::new(move |docs: Vec<CloudDocument>| sizes.lock().unwrap().push(docs.len())),
                )
                .unwrap()
        };

        let id = cloud
            .add(
                "notes",
                CloudDocument {
                    id: String::new(),
                    body: json!({"title": "a"}),
                },
            )
            .unwrap();
        cloud.delete("notes", &id).unwrap();
        assert_eq!(*sizes.lock().unwrap(), vec![0, 1, 0]);

        subscription.unsubscribe();
        cloud
            .add(
                "notes",
                CloudDocument {
                    id: "n1".to_string(),
                    body: json!({}),
                },
            )
            .unwrap();
        assert_eq!(sizes.lock().unwrap().len(), 3);
    }

    #[test]
    fn update_and_delete_report_missing_documents() {
        let cloud = MemoryCloud::new("memory");
        let missing = CloudDocument {
            id: "nope".to_string(),
            body: json!({}),
        };
        assert_eq!(cloud.update("notes", missing).unwrap_err().code, "not_found");
        assert_eq!(cloud.delete("notes", "nope").unwrap_err().code, "not_found");
    }
}
