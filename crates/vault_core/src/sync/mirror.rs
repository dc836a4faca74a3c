//! Two-way bridge between one local record collection and a remote
//! collection of the same name.
//!
//! On attach, local records the remote has never seen are uploaded. Local
//! inserts, edits and removals are then published as they commit. Remote
//! snapshots are merged into the local slot: remote records win by id (last
//! write wins), records the remote dropped are removed, and local records
//! that were never published stay put.

use super::provider::{
    CloudDocument, CloudProvider, CloudSubscription, ProviderError, ProviderResult, SnapshotFn,
    SyncStage,
};
use crate::model::Record;
use crate::repo::{CollectionObserver, RecordCollection};
use log::{error, info, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Ids present in the last remote snapshot.
type SyncedIds = Arc<Mutex<HashSet<String>>>;

pub struct CollectionMirror<T: Record> {
    collection: RecordCollection<T>,
    provider: Arc<dyn CloudProvider>,
    synced: SyncedIds,
    publisher: Arc<dyn CollectionObserver<T>>,
    _subscription: CloudSubscription,
}

impl<T: Record> CollectionMirror<T> {
    /// Subscribes to the remote collection named after `T`'s slot key, then
    /// uploads every local record missing from the first snapshot.
    ///
    /// Relies on the provider delivering the current snapshot from
    /// `subscribe` before returning.
    pub fn attach(
        provider: Arc<dyn CloudProvider>,
        collection: RecordCollection<T>,
    ) -> ProviderResult<Self> {
        let synced = SyncedIds::default();
        let on_change: SnapshotFn = {
            let local = collection.clone();
            let synced = Arc::clone(&synced);
            let provider_id = provider.provider_id().to_string();
            Arc::new(move |documents: Vec<CloudDocument>| {
                apply_snapshot(&local, &synced, &provider_id, documents);
            })
        };
        let subscription = provider.subscribe(T::KIND.storage_key(), on_change)?;

        let publisher: Arc<dyn CollectionObserver<T>> = Arc::new(Publisher {
            provider: Arc::clone(&provider),
        });
        let mirror = Self {
            collection,
            provider,
            synced,
            publisher,
            _subscription: subscription,
        };
        let uploaded = mirror.publish_pending();
        mirror.collection.set_observer(Arc::clone(&mirror.publisher));

        info!(
            "event=sync_attach module=sync status=ok provider={} collection={} uploaded={uploaded}",
            mirror.provider.provider_id(),
            T::KIND.storage_key()
        );
        Ok(mirror)
    }

    /// Local records the remote has not acknowledged yet.
    pub fn pending(&self) -> Vec<T> {
        let synced = lock_ids(&self.synced);
        self.collection
            .all()
            .into_iter()
            .filter(|record| !synced.contains(record.id()))
            .collect()
    }

    /// Uploads pending records (e.g. after a failed publish); returns how
    /// many the provider accepted.
    pub fn publish_pending(&self) -> usize {
        // Oldest first, so providers that prepend keep the local order.
        self.pending()
            .iter()
            .rev()
            .filter(|record| publish_insert(self.provider.as_ref(), *record))
            .count()
    }
}

impl<T: Record> Drop for CollectionMirror<T> {
    fn drop(&mut self) {
        self.collection.remove_observer(&self.publisher);
    }
}

/// Publishes committed local mutations to the provider.
///
/// Failures are logged and leave the record pending; the local commit
/// always stands.
struct Publisher {
    provider: Arc<dyn CloudProvider>,
}

impl<T: Record> CollectionObserver<T> for Publisher {
    fn inserted(&self, records: &[T]) {
        for record in records.iter().rev() {
            publish_insert(self.provider.as_ref(), record);
        }
    }

    fn modified(&self, record: &T) {
        let Some(document) = to_document(record) else {
            return;
        };
        match self.provider.update(T::KIND.storage_key(), document) {
            Ok(()) => {}
            // Never reached the remote; publish it as new instead.
            Err(err) if err.code == "not_found" => {
                publish_insert(self.provider.as_ref(), record);
            }
            Err(err) => log_push_error::<T>(SyncStage::Update, &err),
        }
    }

    fn removed(&self, id: &str) {
        match self.provider.delete(T::KIND.storage_key(), id) {
            Ok(()) => {}
            Err(err) if err.code == "not_found" => {}
            Err(err) => log_push_error::<T>(SyncStage::Delete, &err),
        }
    }
}

fn publish_insert<T: Record>(provider: &dyn CloudProvider, record: &T) -> bool {
    let Some(document) = to_document(record) else {
        return false;
    };
    match provider.add(T::KIND.storage_key(), document) {
        Ok(_) => true,
        Err(err) => {
            log_push_error::<T>(SyncStage::Add, &err);
            false
        }
    }
}

fn log_push_error<T: Record>(stage: SyncStage, err: &ProviderError) {
    warn!(
        "event=sync_push module=sync status=error provider={} collection={} stage={} code={} retryable={}",
        err.provider_id,
        T::KIND.storage_key(),
        stage.as_str(),
        err.code,
        err.retryable
    );
}

fn to_document<T: Record>(record: &T) -> Option<CloudDocument> {
    match serde_json::to_value(record) {
        Ok(body) => Some(CloudDocument {
            id: record.id().to_string(),
            body,
        }),
        Err(err) => {
            error!(
                "event=sync_push module=sync status=error collection={} reason=encode_failed error={err}",
                T::KIND.storage_key()
            );
            None
        }
    }
}

fn apply_snapshot<T: Record>(
    local: &RecordCollection<T>,
    synced: &SyncedIds,
    provider_id: &str,
    documents: Vec<CloudDocument>,
) {
    let mut remote = Vec::with_capacity(documents.len());
    for document in documents {
        match decode_document::<T>(document) {
            Ok(record) => remote.push(record),
            Err(err) => warn!(
                "event=sync_snapshot module=sync status=skipped provider={provider_id} collection={} error={err}",
                T::KIND.storage_key()
            ),
        }
    }
    let remote_ids: HashSet<String> = remote.iter().map(|record| record.id().to_string()).collect();
    let count = remote.len();

    let mut kept = 0;
    let result = local.reconcile(|current| {
        let mut known = lock_ids(synced);
        let mut next: Vec<T> = current
            .into_iter()
            .filter(|record| !remote_ids.contains(record.id()) && !known.contains(record.id()))
            .collect();
        kept = next.len();
        *known = remote_ids;
        next.extend(remote);
        next
    });

    match result {
        Ok(()) => info!(
            "event=sync_snapshot module=sync status=ok provider={provider_id} collection={} remote={count} pending={kept}",
            T::KIND.storage_key()
        ),
        Err(err) => error!(
            "event=sync_snapshot module=sync status=error provider={provider_id} collection={} error={err}",
            T::KIND.storage_key()
        ),
    }
}

/// Decodes a remote document; the document id wins over any id in the body.
fn decode_document<T: Record>(document: CloudDocument) -> serde_json::Result<T> {
    let mut body = document.body;
    if let Value::Object(fields) = &mut body {
        fields.insert("id".to_string(), Value::String(document.id.clone()));
    }
    let mut record: T = serde_json::from_value(body)?;
    record.set_id(document.id);
    Ok(record)
}

fn lock_ids(ids: &SyncedIds) -> MutexGuard<'_, HashSet<String>> {
    ids.lock().unwrap_or_else(PoisonError::into_inner)
}
