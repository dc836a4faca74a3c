//! Generic id-keyed collection stored in one slot.

use crate::model::{Record, RecordKind};
use crate::store::{Binding, Store, StoreError};
use log::info;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Collection-level error.
#[derive(Debug)]
pub enum RepoError {
    Store(StoreError),
    NotFound { kind: RecordKind, id: String },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{} not found: {id}", kind.as_str()),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::NotFound { .. } => None,
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Receives local mutations after they are committed.
///
/// Called with no store lock held, so implementations may write back into
/// the same collection (e.g. through `reconcile`).
pub trait CollectionObserver<T>: Send + Sync {
    fn inserted(&self, records: &[T]);
    fn modified(&self, record: &T);
    fn removed(&self, id: &str);
}

type ObserverCell<T> = Arc<RwLock<Option<Arc<dyn CollectionObserver<T>>>>>;

/// All records of one kind, bound to `T::KIND.storage_key()`.
///
/// Clones share the binding and the observer.
pub struct RecordCollection<T: Record> {
    binding: Binding<Vec<T>>,
    observer: ObserverCell<T>,
}

impl<T: Record> Clone for RecordCollection<T> {
    fn clone(&self) -> Self {
        Self {
            binding: self.binding.clone(),
            observer: Arc::clone(&self.observer),
        }
    }
}

impl<T: Record> RecordCollection<T> {
    /// Opens the collection slot; absent or corrupt slots read as empty.
    pub fn open(store: &Store) -> RepoResult<Self> {
        let binding = store.open(T::KIND.storage_key(), Vec::new())?;
        Ok(Self {
            binding,
            observer: Arc::new(RwLock::new(None)),
        })
    }

    /// Installs the observer for inserts, edits and removals, replacing any
    /// previous one.
    pub fn set_observer(&self, observer: Arc<dyn CollectionObserver<T>>) {
        *self
            .observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    /// Removes `observer` if it is still the installed one.
    pub fn remove_observer(&self, observer: &Arc<dyn CollectionObserver<T>>) {
        let mut slot = self
            .observer
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if slot
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, observer))
        {
            *slot = None;
        }
    }

    fn observer(&self) -> Option<Arc<dyn CollectionObserver<T>>> {
        self.observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn binding(&self) -> &Binding<Vec<T>> {
        &self.binding
    }

    pub fn all(&self) -> Vec<T> {
        self.binding.value()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.all().into_iter().find(|record| record.id() == id)
    }

    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.all().is_empty()
    }

    /// Prepends one record, assigning a fresh id when its id is blank or
    /// already taken. Returns the record as stored.
    pub fn insert_front(&self, record: T) -> RepoResult<T> {
        let mut inserted = self.insert_all_front(vec![record])?;
        Ok(inserted.remove(0))
    }

    /// Prepends `records` keeping their relative order, re-keying blank or
    /// colliding ids (including collisions within `records`).
    pub fn insert_all_front(&self, records: Vec<T>) -> RepoResult<Vec<T>> {
        let mut inserted = Vec::with_capacity(records.len());
        self.binding.try_update(|existing| {
            let mut taken: HashSet<String> =
                existing.iter().map(|record| record.id().to_string()).collect();

            for mut record in records {
                if record.id().trim().is_empty() || taken.contains(record.id()) {
                    record.set_id(fresh_id(|candidate| taken.contains(candidate)));
                }
                taken.insert(record.id().to_string());
                inserted.push(record);
            }

            let mut next = inserted.clone();
            next.extend(existing);
            Ok::<_, RepoError>(next)
        })?;

        info!(
            "event=record_insert module=repo status=ok kind={} count={}",
            T::KIND.as_str(),
            inserted.len()
        );
        if let Some(observer) = self.observer() {
            observer.inserted(&inserted);
        }
        Ok(inserted)
    }

    /// Applies `change` to the record with `id` and returns the result.
    pub fn modify(&self, id: &str, change: impl FnOnce(&mut T)) -> RepoResult<T> {
        self.try_modify(id, |record| {
            change(record);
            Ok::<_, RepoError>(())
        })
        .map(|(record, ())| record)
    }

    /// Like `modify`, but `change` may reject the edit; a rejected edit
    /// writes nothing. Returns the updated record and `change`'s output.
    pub fn try_modify<R, E>(
        &self,
        id: &str,
        change: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Result<(T, R), E>
    where
        E: From<RepoError> + From<StoreError>,
    {
        let mut outcome = None;
        self.binding.try_update(|mut records| {
            let record = records
                .iter_mut()
                .find(|record| record.id() == id)
                .ok_or_else(|| E::from(self.not_found(id)))?;
            let output = change(record)?;
            outcome = Some((record.clone(), output));
            Ok::<_, E>(records)
        })?;
        let (record, output) = outcome.ok_or_else(|| E::from(self.not_found(id)))?;
        if let Some(observer) = self.observer() {
            observer.modified(&record);
        }
        Ok((record, output))
    }

    /// Removes the record with `id` and returns it.
    pub fn remove(&self, id: &str) -> RepoResult<T> {
        let mut removed = None;
        self.binding.try_update(|mut records| {
            let index = records
                .iter()
                .position(|record| record.id() == id)
                .ok_or_else(|| self.not_found(id))?;
            removed = Some(records.remove(index));
            Ok::<_, RepoError>(records)
        })?;

        info!(
            "event=record_remove module=repo status=ok kind={}",
            T::KIND.as_str()
        );
        let removed = removed.ok_or_else(|| self.not_found(id))?;
        if let Some(observer) = self.observer() {
            observer.removed(id);
        }
        Ok(removed)
    }

    /// Replaces the collection with `merge(current)` under the slot's writer
    /// lock. The observer is not called; remote snapshots land here.
    pub fn reconcile(&self, merge: impl FnOnce(Vec<T>) -> Vec<T>) -> RepoResult<()> {
        self.binding.update(merge)?;
        Ok(())
    }

    fn not_found(&self, id: &str) -> RepoError {
        RepoError::NotFound {
            kind: T::KIND,
            id: id.to_string(),
        }
    }
}

/// Generates a UUID v4 string for which `is_taken` returns false.
pub fn fresh_id(is_taken: impl Fn(&str) -> bool) -> String {
    loop {
        let candidate = Uuid::new_v4().to_string();
        if !is_taken(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{fresh_id, CollectionObserver, RecordCollection, RepoError};
    use crate::model::note::Note;
    use crate::store::Store;
    use std::cell::Cell;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl CollectionObserver<Note> for Recorder {
        fn inserted(&self, records: &[Note]) {
            for record in records {
                self.events.lock().unwrap().push(format!("insert {}", record.id));
            }
        }

        fn modified(&self, record: &Note) {
            self.events.lock().unwrap().push(format!("modify {}", record.id));
        }

        fn removed(&self, id: &str) {
            self.events.lock().unwrap().push(format!("remove {id}"));
        }
    }

    fn note(id: &str, title: &str) -> Note {
        Note {
            id: id.to_string(),
            title: title.to_string(),
            content: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
            pinned: false,
        }
    }

    #[test]
    fn insert_front_prepends_and_rekeys_collisions() {
        let store = Store::in_memory();
        let notes = RecordCollection::<Note>::open(&store).unwrap();
        notes.insert_front(note("a", "first")).unwrap();

        let second = notes.insert_front(note("a", "second")).unwrap();
        assert_ne!(second.id, "a");

        let all = notes.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "second");
        assert_eq!(all[1].id, "a");
    }

    #[test]
    fn insert_all_front_rekeys_duplicates_within_batch() {
        let store = Store::in_memory();
        let notes = RecordCollection::<Note>::open(&store).unwrap();
        let inserted = notes
            .insert_all_front(vec![note("x", "one"), note("x", "two"), note("", "three")])
            .unwrap();

        assert_eq!(inserted[0].id, "x");
        assert_ne!(inserted[1].id, "x");
        assert!(!inserted[2].id.is_empty());
        let titles: Vec<_> = notes.all().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["one", "two", "three"]);
    }

    #[test]
    fn modify_and_remove_report_missing_ids() {
        let store = Store::in_memory();
        let notes = RecordCollection::<Note>::open(&store).unwrap();
        notes.insert_front(note("a", "first")).unwrap();

        let renamed = notes.modify("a", |n| n.title = "renamed".to_string()).unwrap();
        assert_eq!(renamed.title, "renamed");
        assert_eq!(notes.get("a").unwrap().title, "renamed");

        assert!(matches!(
            notes.modify("missing", |_| {}),
            Err(RepoError::NotFound { .. })
        ));
        assert_eq!(notes.remove("a").unwrap().title, "renamed");
        assert!(matches!(notes.remove("a"), Err(RepoError::NotFound { .. })));
        assert!(notes.is_empty());
    }

    #[test]
    fn fresh_id_skips_taken_candidates() {
        let calls = Cell::new(0);
        let id = fresh_id(|_| {
            calls.set(calls.get() + 1);
            calls.get() < 3
        });
        assert!(!id.is_empty());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn observer_sees_local_mutations_but_not_reconcile() {
        let store = Store::in_memory();
        let notes = RecordCollection::<Note>::open(&store).unwrap();
        let recorder = Arc::new(Recorder::default());
        let observer: Arc<dyn CollectionObserver<Note>> = recorder.clone();
        notes.set_observer(Arc::clone(&observer));

        notes.insert_front(note("a", "first")).unwrap();
        notes.modify("a", |n| n.pinned = true).unwrap();
        assert!(notes.modify("missing", |_| {}).is_err());
        notes
            .reconcile(|mut current| {
                current.push(note("r", "remote"));
                current
            })
            .unwrap();
        notes.remove("a").unwrap();
        assert_eq!(notes.all()[0].id, "r");

        notes.remove_observer(&observer);
        notes.insert_front(note("b", "unobserved")).unwrap();

        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["insert a", "modify a", "remove a"]
        );
    }
}
