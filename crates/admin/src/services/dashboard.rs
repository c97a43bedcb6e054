//! Dashboard figures.

use std::sync::Arc;

use serde::de::IgnoredAny;
use tokio::sync::watch;

use crate::error::AppError;
use crate::mirror::LiveMirror;
use crate::services::catalog::products_collection;
use crate::store::{DocumentStore, Query};

/// Live count of every document in `products`.
#[derive(Debug)]
pub struct ProductCounter {
    mirror: LiveMirror<IgnoredAny>,
}

impl ProductCounter {
    /// Start counting. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the listener cannot start.
    pub fn start(store: &Arc<dyn DocumentStore>) -> Result<Self, AppError> {
        let mirror = LiveMirror::new("product-count");
        mirror.attach(store.listen(Query::collection(products_collection()))?, None);
        Ok(Self { mirror })
    }

    /// Current number of products.
    #[must_use]
    pub fn count(&self) -> usize {
        self.mirror.len()
    }

    /// Whether the first count has arrived.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.mirror.is_loaded()
    }

    /// Wait for the first count.
    pub async fn ready(&self) {
        self.mirror.loaded().await;
    }

    /// Receiver that ticks whenever the count may have changed.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.mirror.changes()
    }
}
