//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::CategoryDeletePolicy;
use crate::console::Consoles;
use crate::error::AppError;
use crate::services::ProductCounter;
use crate::storage::ObjectStorage;
use crate::store::DocumentStore;

/// Application state shared across all handlers.
///
/// Cloning is cheap; every clone shares the same registry and counter.
/// Per-session state lives in [`Consoles`], never here.
#[derive(Clone, Debug)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

#[derive(Debug)]
struct AppStateInner {
    consoles: Consoles,
    counter: ProductCounter,
}

impl AppState {
    /// Start the product counter and an empty console registry.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the counter's listener cannot start.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        policy: CategoryDeletePolicy,
    ) -> Result<Self, AppError> {
        let counter = ProductCounter::start(&store)?;
        let consoles = Consoles::new(store, storage, policy);
        Ok(Self {
            inner: Arc::new(AppStateInner { consoles, counter }),
        })
    }

    #[must_use]
    pub fn consoles(&self) -> &Consoles {
        &self.inner.consoles
    }

    #[must_use]
    pub fn counter(&self) -> &ProductCounter {
        &self.inner.counter
    }

    /// Whether the product counter has delivered its first snapshot.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.counter.is_ready()
    }
}
