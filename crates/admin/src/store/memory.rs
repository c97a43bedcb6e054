//! In-process document store.
//!
//! Keeps every collection in memory, fans out snapshots to live listeners
//! on each write, and optionally mirrors the whole dataset to a JSON file so
//! the admin binary and the CLI can share one catalog.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use super::{
    CollectionPath, DocumentPath, DocumentSnapshot, DocumentStore, Fields, Listener, Query,
    QuerySnapshot, StoreError,
};

/// Length of generated document keys.
const AUTO_ID_LENGTH: usize = 20;

type Collections = BTreeMap<String, BTreeMap<String, Fields>>;

/// On-disk layout of a persisted store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Persisted {
    collections: Collections,
}

struct Subscriber {
    query: Query,
    tx: mpsc::UnboundedSender<QuerySnapshot>,
}

#[derive(Default)]
struct State {
    collections: Collections,
    subscribers: Vec<Subscriber>,
}

impl State {
    fn snapshot(&self, query: &Query) -> QuerySnapshot {
        let docs = self
            .collections
            .get(query.collection.as_str())
            .map(|docs| query.apply(docs.iter()))
            .unwrap_or_default();
        QuerySnapshot { docs }
    }

    /// Push a fresh snapshot to every listener on `collection`, dropping
    /// listeners whose handle is gone.
    fn notify(&mut self, collection: &CollectionPath) {
        let mut subscribers = std::mem::take(&mut self.subscribers);
        subscribers.retain(|sub| {
            if sub.tx.is_closed() {
                return false;
            }
            if &sub.query.collection != collection {
                return true;
            }
            sub.tx.send(self.snapshot(&sub.query)).is_ok()
        });
        self.subscribers = subscribers;
    }
}

struct Inner {
    state: Mutex<State>,
    persist_path: Option<PathBuf>,
    /// Serializes writers so a candidate state is never built from a stale base.
    write_lock: tokio::sync::Mutex<()>,
    operations: AtomicU64,
}

/// In-memory [`DocumentStore`].
///
/// Cloning is cheap and clones share the same data.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("persist_path", &self.inner.persist_path)
            .field("operations", &self.operations())
            .finish_non_exhaustive()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty, non-persistent store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(State::default(), None)
    }

    /// Open a store persisted at `path`, loading existing data if the file
    /// exists. Every write rewrites the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let collections = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Persisted>(&bytes)?.collections,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Collections::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), collections = collections.len(), "Opened catalog data file");

        let state = State {
            collections,
            subscribers: Vec::new(),
        };
        Ok(Self::with_state(state, Some(path)))
    }

    fn with_state(state: State, persist_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                persist_path,
                write_lock: tokio::sync::Mutex::new(()),
                operations: AtomicU64::new(0),
            }),
        }
    }

    /// Number of store calls made so far (reads, writes and listens).
    #[must_use]
    pub fn operations(&self) -> u64 {
        self.inner.operations.load(Ordering::Relaxed)
    }

    /// Number of live listeners that are still attached.
    #[must_use]
    pub fn active_listeners(&self) -> usize {
        self.state()
            .subscribers
            .iter()
            .filter(|sub| !sub.tx.is_closed())
            .count()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_operation(&self) {
        self.inner.operations.fetch_add(1, Ordering::Relaxed);
    }

    /// Apply `change` to a copy of the data, write the copy to disk, and only
    /// then install it and notify listeners on `collection`.
    ///
    /// `change` returns its output and whether anything changed. A failed
    /// persist leaves the visible state untouched.
    async fn commit<R>(
        &self,
        collection: &CollectionPath,
        change: impl FnOnce(&mut Collections) -> Result<(R, bool), StoreError> + Send,
    ) -> Result<R, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut candidate = self.state().collections.clone();
        let (output, changed) = change(&mut candidate)?;
        if !changed {
            return Ok(output);
        }

        self.persist(&candidate).await?;

        let mut state = self.state();
        state.collections = candidate;
        state.notify(collection);
        Ok(output)
    }

    async fn persist(&self, collections: &Collections) -> Result<(), StoreError> {
        let Some(path) = &self.inner.persist_path else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(&PersistedRef { collections })?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

#[derive(Serialize)]
struct PersistedRef<'a> {
    collections: &'a Collections,
}

fn generate_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LENGTH)
        .map(char::from)
        .collect()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    #[instrument(skip(self, data), fields(collection = %collection))]
    async fn add(&self, collection: &CollectionPath, data: Fields) -> Result<String, StoreError> {
        self.record_operation();
        self.commit(collection, |collections| {
            let docs = collections
                .entry(collection.as_str().to_owned())
                .or_default();
            let mut id = generate_id();
            while docs.contains_key(&id) {
                id = generate_id();
            }
            docs.insert(id.clone(), data);
            Ok((id, true))
        })
        .await
    }

    #[instrument(skip(self, data), fields(doc = %doc))]
    async fn set(&self, doc: &DocumentPath, data: Fields) -> Result<(), StoreError> {
        self.record_operation();
        self.commit(doc.collection(), |collections| {
            collections
                .entry(doc.collection().as_str().to_owned())
                .or_default()
                .insert(doc.id().to_owned(), data);
            Ok(((), true))
        })
        .await
    }

    #[instrument(skip(self, fields), fields(doc = %doc))]
    async fn update(&self, doc: &DocumentPath, fields: Fields) -> Result<(), StoreError> {
        self.record_operation();
        self.commit(doc.collection(), |collections| {
            let existing = collections
                .get_mut(doc.collection().as_str())
                .and_then(|docs| docs.get_mut(doc.id()))
                .ok_or_else(|| StoreError::NotFound(doc.to_string()))?;
            existing.extend(fields);
            Ok(((), true))
        })
        .await
    }

    #[instrument(skip(self), fields(doc = %doc))]
    async fn delete(&self, doc: &DocumentPath) -> Result<(), StoreError> {
        self.record_operation();
        // Deleting a missing document succeeds, matching the hosted backend.
        self.commit(doc.collection(), |collections| {
            let removed = collections
                .get_mut(doc.collection().as_str())
                .and_then(|docs| docs.remove(doc.id()));
            Ok(((), removed.is_some()))
        })
        .await
    }

    async fn get(&self, doc: &DocumentPath) -> Result<Option<DocumentSnapshot>, StoreError> {
        self.record_operation();
        let state = self.state();
        Ok(state
            .collections
            .get(doc.collection().as_str())
            .and_then(|docs| docs.get(doc.id()))
            .map(|data| DocumentSnapshot {
                id: doc.id().to_owned(),
                data: data.clone(),
            }))
    }

    async fn query(&self, query: &Query) -> Result<QuerySnapshot, StoreError> {
        self.record_operation();
        Ok(self.state().snapshot(query))
    }

    fn listen(&self, query: Query) -> Result<Listener, StoreError> {
        self.record_operation();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state();
        // The receiver is alive, so the initial send cannot fail.
        let _ = tx.send(state.snapshot(&query));
        debug!(collection = %query.collection, "Listener attached");
        state.subscribers.push(Subscriber { query, tx });
        Ok(Listener::new(rx))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::*;
    use crate::store::Direction;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn products() -> CollectionPath {
        CollectionPath::root("products")
    }

    #[tokio::test]
    async fn test_add_generates_alphanumeric_ids() {
        let store = MemoryStore::new();
        let id = store
            .add(&products(), fields(json!({"title": "Ruby"})))
            .await
            .unwrap();
        assert_eq!(id.len(), AUTO_ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));

        let doc = store.get(&products().doc(&id)).await.unwrap().unwrap();
        assert_eq!(doc.data.get("title"), Some(&json!("Ruby")));
    }

    #[tokio::test]
    async fn test_update_merges_and_requires_existing() {
        let store = MemoryStore::new();
        let doc = products().doc("p1");
        assert!(matches!(
            store.update(&doc, fields(json!({"price": 1}))).await,
            Err(StoreError::NotFound(_))
        ));

        store
            .set(&doc, fields(json!({"title": "Ruby", "price": 10})))
            .await
            .unwrap();
        store.update(&doc, fields(json!({"price": 12}))).await.unwrap();

        let data = store.get(&doc).await.unwrap().unwrap().data;
        assert_eq!(data, fields(json!({"title": "Ruby", "price": 12})));
    }

    #[tokio::test]
    async fn test_listener_receives_initial_and_change_snapshots() {
        let store = MemoryStore::new();
        let query = Query::collection(products()).order_by("created_at", Direction::Descending);
        let mut listener = store.listen(query).unwrap();

        let initial = listener.next().await.unwrap();
        assert!(initial.is_empty());

        store
            .add(&products(), fields(json!({"created_at": 1})))
            .await
            .unwrap();
        let next = listener.next().await.unwrap();
        assert_eq!(next.len(), 1);
    }

    #[tokio::test]
    async fn test_listener_ignores_other_collections() {
        let store = MemoryStore::new();
        let mut listener = store.listen(Query::collection(products())).unwrap();
        let _ = listener.next().await;

        store
            .add(&CollectionPath::root("categories"), fields(json!({"name": "Rings"})))
            .await
            .unwrap();
        store.add(&products(), fields(json!({}))).await.unwrap();

        // Only the products write produced a snapshot.
        let next = listener.next().await.unwrap();
        assert_eq!(next.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_listener_is_pruned() {
        let store = MemoryStore::new();
        let listener = store.listen(Query::collection(products())).unwrap();
        assert_eq!(store.active_listeners(), 1);

        listener.unsubscribe();
        assert_eq!(store.active_listeners(), 0);
    }

    #[tokio::test]
    async fn test_delete_keeps_subcollections() {
        let store = MemoryStore::new();
        let categories = CollectionPath::root("categories");
        let cat = categories.doc("c1");
        store.set(&cat, fields(json!({"name": "Rings"}))).await.unwrap();
        let subs = cat.subcollection("subcategories");
        store
            .add(&subs, fields(json!({"name": "Gold Rings"})))
            .await
            .unwrap();

        store.delete(&cat).await.unwrap();

        assert!(store.get(&cat).await.unwrap().is_none());
        let remaining = store.query(&Query::collection(subs)).await.unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let store = MemoryStore::open(&path).await.unwrap();
        let id = store
            .add(&products(), fields(json!({"title": "Emerald"})))
            .await
            .unwrap();

        let reopened = MemoryStore::open(&path).await.unwrap();
        assert!(reopened.get(&products().doc(&id)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        let store = MemoryStore::open(blocker.join("catalog.json")).await.unwrap();
        // A regular file where the data directory should be makes every write fail.
        std::fs::write(&blocker, b"not a directory").unwrap();

        let categories = CollectionPath::root("categories");
        let mut listener = store.listen(Query::collection(categories.clone())).unwrap();
        assert!(listener.next().await.unwrap().is_empty());

        let added = store
            .add(&categories, fields(json!({"name": "Rings"})))
            .await;
        assert!(matches!(added, Err(StoreError::Io(_))));

        let set = store
            .set(&categories.doc("c1"), fields(json!({"name": "Pendants"})))
            .await;
        assert!(set.is_err());

        let visible = store.query(&Query::collection(categories)).await.unwrap();
        assert!(visible.is_empty());
        let pushed = tokio::time::timeout(Duration::from_millis(50), listener.next()).await;
        assert!(pushed.is_err(), "no snapshot is pushed for a failed write");
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_prior_document() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        let store = MemoryStore::open(blocker.join("catalog.json")).await.unwrap();
        let doc = products().doc("p1");
        store
            .set(&doc, fields(json!({"title": "Ruby", "price": 10})))
            .await
            .unwrap();

        std::fs::remove_dir_all(&blocker).unwrap();
        std::fs::write(&blocker, b"not a directory").unwrap();

        assert!(store.update(&doc, fields(json!({"price": 12}))).await.is_err());
        assert!(store.delete(&doc).await.is_err());

        let data = store.get(&doc).await.unwrap().unwrap().data;
        assert_eq!(data, fields(json!({"title": "Ruby", "price": 10})));
    }
}
