//! CLI command implementations.

pub mod list;
pub mod seed;

use std::path::Path;
use std::sync::Arc;

use gem_catalog_admin::store::{DocumentStore, MemoryStore, StoreError};

/// Open the file-backed catalog store.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn open_store(path: &Path) -> Result<Arc<dyn DocumentStore>, StoreError> {
    tracing::info!(path = %path.display(), "Opening catalog data");
    Ok(Arc::new(MemoryStore::open(path).await?))
}
