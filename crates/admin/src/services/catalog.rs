//! Catalog sync: the live product list behind the products screen.
//!
//! One product subscription is active at a time. A blank search term
//! follows the whole catalog newest-first; a non-blank term follows a
//! title prefix range. Either way the mirrored list is then filtered
//! client-side so the term also matches inside descriptions and origins.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{error, info, instrument};

use gem_catalog_core::ProductId;

use crate::error::AppError;
use crate::mirror::LiveMirror;
use crate::models::{PRODUCTS_COLLECTION, Product, ProductUpdate};
use crate::notices::Notifier;
use crate::store::{CollectionPath, Direction, DocumentStore, Query, to_fields};

/// Live, searchable product list.
pub struct CatalogSync {
    store: Arc<dyn DocumentStore>,
    notifier: Notifier,
    mirror: LiveMirror<Product>,
    /// Term of the active subscription, `None` before the first subscribe.
    term: Mutex<Option<String>>,
}

impl std::fmt::Debug for CatalogSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogSync")
            .field("mirror", &self.mirror)
            .field("term", &self.search_term())
            .finish_non_exhaustive()
    }
}

impl CatalogSync {
    /// Create a catalog with no active subscription.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, notifier: Notifier) -> Self {
        Self {
            store,
            notifier,
            mirror: LiveMirror::new("products"),
            term: Mutex::new(None),
        }
    }

    /// Follow the products matching `term`.
    ///
    /// The previous subscription is torn down before the new one starts.
    /// Subscribing again with the active term does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the store refuses the listener. The
    /// previous subscription stays active in that case.
    #[instrument(skip(self))]
    pub fn subscribe(&self, term: &str) -> Result<(), AppError> {
        let mut active = self.term.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_deref() == Some(term) {
            return Ok(());
        }

        let listener = self.store.listen(products_query(term)).map_err(|e| {
            error!(error = %e, "Failed to subscribe to products");
            AppError::Store(e)
        })?;
        self.mirror.attach(listener, None);
        *active = Some(term.to_owned());

        info!(blank = term.trim().is_empty(), "Product subscription replaced");
        Ok(())
    }

    /// Stop following products and clear the list.
    pub fn unsubscribe(&self) {
        let mut active = self.term.lock().unwrap_or_else(PoisonError::into_inner);
        self.mirror.detach();
        *active = None;
    }

    /// Search term of the active subscription.
    #[must_use]
    pub fn search_term(&self) -> Option<String> {
        self.term
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current products, filtered by the active term.
    #[must_use]
    pub fn list(&self) -> Vec<Product> {
        let term = self.search_term().unwrap_or_default();
        filter_products(self.mirror.items(), &term)
    }

    /// Whether the active subscription has delivered its first snapshot.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.mirror.is_loaded()
    }

    /// Wait until the active subscription has delivered a snapshot.
    pub async fn ready(&self) {
        self.mirror.loaded().await;
    }

    /// Receiver that ticks whenever the list changes.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.mirror.changes()
    }

    /// Delete a product.
    ///
    /// The list changes when the store pushes the next snapshot, not here.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the delete fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete(&self, id: &ProductId) -> Result<(), AppError> {
        let doc = products_collection().doc(id);
        match self.store.delete(&doc).await {
            Ok(()) => {
                info!("Product deleted");
                self.notifier.success("Deleted");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to delete product");
                self.notifier.error("Delete failed");
                Err(e.into())
            }
        }
    }

    /// Merge edited fields into a product.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the write fails, including when the
    /// product no longer exists.
    #[instrument(skip(self, update), fields(product_id = %id))]
    pub async fn update(&self, id: &ProductId, update: &ProductUpdate) -> Result<(), AppError> {
        let doc = products_collection().doc(id);
        let result = match to_fields(update) {
            Ok(fields) => self.store.update(&doc, fields).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!("Product updated");
                self.notifier.success("Product updated successfully");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to update product");
                self.notifier.error("Failed to update product");
                Err(e.into())
            }
        }
    }
}

pub(crate) fn products_collection() -> CollectionPath {
    CollectionPath::root(PRODUCTS_COLLECTION)
}

/// The store query followed for `term`.
///
/// A blank term (after trimming) lists everything newest-first. Otherwise
/// the untrimmed term is used as a case-sensitive title prefix.
#[must_use]
pub fn products_query(term: &str) -> Query {
    let query = Query::collection(products_collection());
    if term.trim().is_empty() {
        query.order_by("created_at", Direction::Descending)
    } else {
        query.prefix("title", term)
    }
}

/// Case-insensitive substring filter over title, description and origin.
///
/// A blank term keeps every product. Order is preserved.
#[must_use]
pub fn filter_products(products: Vec<Product>, term: &str) -> Vec<Product> {
    if term.trim().is_empty() {
        return products;
    }
    let needle = term.to_lowercase();
    products
        .into_iter()
        .filter(|p| p.matches_lowercase(&needle))
        .collect()
}
