//! Per-session console state.
//!
//! Every admin session works against its own [`Console`]: its own category
//! selection, product subscription, submission flag and notices. Two admins
//! editing the catalog at once never see each other's selection or search.
//!
//! Consoles live in a [`Consoles`] registry keyed by an opaque key stored in
//! the session. A console unused for longer than the idle timeout is
//! dropped, which detaches its listeners.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::{debug, info};

use crate::config::CategoryDeletePolicy;
use crate::error::AppError;
use crate::notices::Notifier;
use crate::services::{CatalogSync, CategoryTree, CmsPages, ProductForms};
use crate::storage::ObjectStorage;
use crate::store::DocumentStore;

/// How long an unused console is kept (24 hours).
pub const CONSOLE_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Length of generated console keys.
const CONSOLE_KEY_LENGTH: usize = 32;

/// The services behind one admin session.
pub struct Console {
    notifier: Notifier,
    catalog: CatalogSync,
    categories: CategoryTree,
    forms: ProductForms,
    cms: CmsPages,
    search: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("catalog", &self.catalog)
            .field("selected", &self.categories.selected_category())
            .field("forms", &self.forms)
            .finish_non_exhaustive()
    }
}

impl Console {
    /// Build the services and start their listeners.
    ///
    /// The catalog starts out following every product, newest first.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if a listener cannot be started.
    pub fn open(
        store: &Arc<dyn DocumentStore>,
        storage: &Arc<dyn ObjectStorage>,
        policy: CategoryDeletePolicy,
    ) -> Result<Self, AppError> {
        let notifier = Notifier::new();

        let catalog = CatalogSync::new(Arc::clone(store), notifier.clone());
        catalog.subscribe("")?;
        let categories = CategoryTree::new(Arc::clone(store), notifier.clone(), policy)?;
        let forms = ProductForms::new(Arc::clone(store), Arc::clone(storage), notifier.clone());
        let cms = CmsPages::new(Arc::clone(store), notifier.clone());

        Ok(Self {
            notifier,
            catalog,
            categories,
            forms,
            cms,
            search: tokio::sync::Mutex::new(()),
        })
    }

    #[must_use]
    pub const fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    #[must_use]
    pub const fn catalog(&self) -> &CatalogSync {
        &self.catalog
    }

    #[must_use]
    pub const fn categories(&self) -> &CategoryTree {
        &self.categories
    }

    #[must_use]
    pub const fn forms(&self) -> &ProductForms {
        &self.forms
    }

    #[must_use]
    pub const fn cms(&self) -> &CmsPages {
        &self.cms
    }

    /// Exclusive turn on the product subscription.
    ///
    /// Hold it from switching the search term until the list has been read,
    /// so concurrent searches in one session each see their own term.
    pub async fn search_turn(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.search.lock().await
    }
}

struct Entry {
    console: Arc<Console>,
    last_seen: Instant,
}

/// Registry of open consoles.
pub struct Consoles {
    store: Arc<dyn DocumentStore>,
    storage: Arc<dyn ObjectStorage>,
    policy: CategoryDeletePolicy,
    idle_timeout: Duration,
    open: Mutex<HashMap<String, Entry>>,
}

impl std::fmt::Debug for Consoles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consoles")
            .field("policy", &self.policy)
            .field("idle_timeout", &self.idle_timeout)
            .field("open", &self.len())
            .finish_non_exhaustive()
    }
}

impl Consoles {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        policy: CategoryDeletePolicy,
    ) -> Self {
        Self {
            store,
            storage,
            policy,
            idle_timeout: CONSOLE_IDLE_TIMEOUT,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the idle timeout.
    #[must_use]
    pub const fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Console stored under `key`, refreshing its idle timer.
    ///
    /// Returns `None` for unknown keys and for consoles that have idled out.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<Console>> {
        let mut entries = self.entries();
        let entry = entries.get_mut(key)?;
        if entry.last_seen.elapsed() >= self.idle_timeout {
            entries.remove(key);
            debug!("Console idled out");
            return None;
        }
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.console))
    }

    /// Open a console under a fresh key.
    ///
    /// Idle consoles are swept first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the console's listeners cannot start.
    pub fn open(&self) -> Result<(String, Arc<Console>), AppError> {
        let console = Arc::new(Console::open(&self.store, &self.storage, self.policy)?);

        let mut entries = self.entries();
        let idle_timeout = self.idle_timeout;
        entries.retain(|_, entry| entry.last_seen.elapsed() < idle_timeout);

        let mut key = generate_key();
        while entries.contains_key(&key) {
            key = generate_key();
        }
        entries.insert(
            key.clone(),
            Entry {
                console: Arc::clone(&console),
                last_seen: Instant::now(),
            },
        );
        info!(open = entries.len(), "Console opened");
        Ok((key, console))
    }

    /// Drop the console stored under `key`. Returns whether one existed.
    pub fn close(&self, key: &str) -> bool {
        let closed = self.entries().remove(key).is_some();
        if closed {
            info!("Console closed");
        }
        closed
    }

    /// Number of open consoles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn generate_key() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CONSOLE_KEY_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use url::Url;

    use super::*;
    use crate::storage::StorageError;
    use crate::store::MemoryStore;

    struct NoStorage;

    #[async_trait]
    impl ObjectStorage for NoStorage {
        async fn upload(
            &self,
            key: &str,
            _bytes: Vec<u8>,
            _content_type: Option<&str>,
        ) -> Result<Url, StorageError> {
            Err(StorageError::InvalidKey(key.to_string()))
        }
    }

    fn consoles(store: &MemoryStore) -> Consoles {
        Consoles::new(
            Arc::new(store.clone()),
            Arc::new(NoStorage),
            CategoryDeletePolicy::Orphan,
        )
    }

    #[tokio::test]
    async fn test_each_console_has_its_own_state() {
        let store = MemoryStore::new();
        let consoles = consoles(&store);

        let (first_key, first) = consoles.open().unwrap();
        let (second_key, second) = consoles.open().unwrap();
        assert_ne!(first_key, second_key);
        assert_eq!(consoles.len(), 2);

        first.notifier().success("Category created");
        assert!(second.notifier().drain_recent().is_empty());

        first.catalog().subscribe("Ruby").unwrap();
        assert_eq!(second.catalog().search_term().as_deref(), Some(""));

        assert!(Arc::ptr_eq(&consoles.get(&first_key).unwrap(), &first));
    }

    #[tokio::test]
    async fn test_closing_a_console_releases_its_listeners() {
        let store = MemoryStore::new();
        let consoles = consoles(&store);

        let (key, console) = consoles.open().unwrap();
        assert!(store.active_listeners() > 0);
        drop(console);

        assert!(consoles.close(&key));
        assert!(!consoles.close(&key));
        assert!(consoles.get(&key).is_none());

        // Aborted listener tasks release their receivers on their next poll.
        let released = tokio::time::timeout(Duration::from_secs(2), async {
            while store.active_listeners() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(released.is_ok());
    }

    #[tokio::test]
    async fn test_idle_consoles_are_dropped() {
        let store = MemoryStore::new();
        let consoles = consoles(&store).with_idle_timeout(Duration::ZERO);

        let (key, _) = consoles.open().unwrap();
        assert!(consoles.get(&key).is_none());
        assert!(consoles.is_empty());
    }
}
