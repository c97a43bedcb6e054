//! Integration tests for the gem catalog admin console.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p gem-catalog-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `catalog_sync` - Live product list, search and product commands
//! - `category_tree` - Selection, subcategory scoping and delete policies
//! - `product_forms` - Create and edit flows with image uploads
//! - `http_api` - Admin router end to end
//!
//! Everything runs against [`MemoryStore`]; no external services are needed.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use url::Url;

use gem_catalog_admin::models::{Category, Placement, Subcategory};
use gem_catalog_admin::services::ImageUpload;
use gem_catalog_admin::storage::{ObjectStorage, StorageError};
use gem_catalog_admin::store::{
    CollectionPath, DocumentPath, DocumentSnapshot, DocumentStore, Fields, Listener, MemoryStore,
    Query, QuerySnapshot, StoreError,
};
use gem_catalog_core::{CategoryId, SubcategoryId};

/// How long a test waits for a listener to catch up.
pub const WAIT: Duration = Duration::from_secs(2);

/// Wait until `done` holds, re-checking each time `changes` ticks.
///
/// # Panics
///
/// Panics if `done` is still false after [`WAIT`].
pub async fn wait_for(mut changes: watch::Receiver<u64>, done: impl Fn() -> bool) {
    let result = tokio::time::timeout(WAIT, async {
        while !done() {
            if changes.changed().await.is_err() {
                break;
            }
        }
    })
    .await;
    assert!(result.is_ok() && done(), "condition not reached in {WAIT:?}");
}

/// Poll `done` until it holds.
///
/// For state that has no change channel, such as listener counts.
///
/// # Panics
///
/// Panics if `done` is still false after [`WAIT`].
pub async fn eventually(done: impl Fn() -> bool) {
    let result = tokio::time::timeout(WAIT, async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "condition not reached in {WAIT:?}");
}

/// A [`MemoryStore`] whose writes can be switched to fail.
///
/// Reads and listens always go to the wrapped store.
#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: Arc<AtomicBool>,
}

impl FlakyStore {
    #[must_use]
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn add(&self, collection: &CollectionPath, data: Fields) -> Result<String, StoreError> {
        self.check()?;
        self.inner.add(collection, data).await
    }

    async fn set(&self, doc: &DocumentPath, data: Fields) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set(doc, data).await
    }

    async fn update(&self, doc: &DocumentPath, fields: Fields) -> Result<(), StoreError> {
        self.check()?;
        self.inner.update(doc, fields).await
    }

    async fn delete(&self, doc: &DocumentPath) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete(doc).await
    }

    async fn get(&self, doc: &DocumentPath) -> Result<Option<DocumentSnapshot>, StoreError> {
        self.inner.get(doc).await
    }

    async fn query(&self, query: &Query) -> Result<QuerySnapshot, StoreError> {
        self.inner.query(query).await
    }

    fn listen(&self, query: Query) -> Result<Listener, StoreError> {
        self.inner.listen(query)
    }
}

/// Storage that hands out `https://cdn.test/{key}` without writing anything.
#[derive(Debug, Default)]
pub struct CdnStub;

#[async_trait]
impl ObjectStorage for CdnStub {
    async fn upload(
        &self,
        key: &str,
        _bytes: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<Url, StorageError> {
        Ok(Url::parse("https://cdn.test/")?.join(key)?)
    }
}

/// An image upload with a few bytes of content.
#[must_use]
pub fn image(file_name: &str) -> ImageUpload {
    ImageUpload {
        file_name: file_name.to_string(),
        content_type: Some("image/jpeg".to_string()),
        bytes: vec![0xff, 0xd8, 0xff],
    }
}

/// A placement that does not need to exist in the store.
#[must_use]
pub fn placement(category: &str, subcategory: &str) -> Placement {
    Placement {
        category: Category {
            id: CategoryId::new(format!("{}-id", category.to_lowercase())),
            name: category.to_string(),
        },
        subcategory: Subcategory {
            id: SubcategoryId::new(format!("{}-id", subcategory.to_lowercase())),
            name: subcategory.to_string(),
        },
    }
}

/// Shared handle to a store for services that take `Arc<dyn DocumentStore>`.
#[must_use]
pub fn shared<S: DocumentStore + Clone>(store: &S) -> Arc<dyn DocumentStore> {
    Arc::new(store.clone())
}
