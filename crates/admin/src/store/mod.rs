//! Document store contract consumed by the console.
//!
//! # Model
//!
//! The backend is a hosted document database:
//!
//! - `products` - Catalog products
//! - `categories` - Top-level categories
//! - `categories/{id}/subcategories` - Subcategories nested under a category
//! - `cms` - Legal page content, keyed by slug
//!
//! Every console component talks to the backend through [`DocumentStore`].
//! Reads that must stay current use [`DocumentStore::listen`], which pushes a
//! fresh [`QuerySnapshot`] whenever a document in the queried collection
//! changes.
//!
//! # Implementations
//!
//! - [`MemoryStore`] - In-process store with optional JSON persistence

pub mod memory;
mod query;

use async_trait::async_trait;
use core::fmt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

pub use memory::MemoryStore;
pub use query::{Direction, OrderBy, PREFIX_END, Query};

/// Field map of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Backend refused the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored document does not have the expected shape.
    #[error("invalid document at {path}: {source}")]
    Decode {
        /// Path of the offending document.
        path: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// Value could not be turned into document fields.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local persistence failed.
    #[error("persistence error: {0}")]
    Io(#[from] std::io::Error),
}

/// Slash-separated path of a collection, e.g. `categories/abc/subcategories`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// A top-level collection.
    #[must_use]
    pub fn root(name: &str) -> Self {
        Self(name.to_owned())
    }

    /// A document inside this collection.
    #[must_use]
    pub fn doc(&self, id: impl AsRef<str>) -> DocumentPath {
        DocumentPath {
            collection: self.clone(),
            id: id.as_ref().to_owned(),
        }
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl DocumentPath {
    /// The collection holding this document.
    #[must_use]
    pub const fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// The document key.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// A collection nested under this document.
    #[must_use]
    pub fn subcollection(&self, name: &str) -> CollectionPath {
        CollectionPath(format!("{}/{}/{name}", self.collection, self.id))
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    /// Document key.
    pub id: String,
    /// Stored fields.
    pub data: Fields,
}

impl DocumentSnapshot {
    /// Decode into a model type, exposing the document key as field `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decode`] if the fields do not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(data)).map_err(|source| StoreError::Decode {
            path: self.id.clone(),
            source,
        })
    }
}

/// Result of a query: the matching documents in query order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySnapshot {
    /// Matching documents.
    pub docs: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    /// Number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Handle to a live query subscription.
///
/// Yields the initial snapshot first, then one snapshot per change to the
/// queried collection. Dropping the handle ends the subscription.
#[derive(Debug)]
pub struct Listener {
    rx: mpsc::UnboundedReceiver<QuerySnapshot>,
}

impl Listener {
    /// Wrap the receiving side of a snapshot channel.
    #[must_use]
    pub const fn new(rx: mpsc::UnboundedReceiver<QuerySnapshot>) -> Self {
        Self { rx }
    }

    /// Wait for the next snapshot. Returns `None` once the store stops
    /// delivering.
    pub async fn next(&mut self) -> Option<QuerySnapshot> {
        self.rx.recv().await
    }

    /// End the subscription immediately.
    pub fn unsubscribe(mut self) {
        self.rx.close();
    }
}

/// Operations the console needs from the document backend.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Create a document with a generated key and return the key.
    async fn add(&self, collection: &CollectionPath, data: Fields) -> Result<String, StoreError>;

    /// Create or overwrite a document.
    async fn set(&self, doc: &DocumentPath, data: Fields) -> Result<(), StoreError>;

    /// Merge fields into an existing document.
    ///
    /// Fails with [`StoreError::NotFound`] if the document does not exist.
    async fn update(&self, doc: &DocumentPath, fields: Fields) -> Result<(), StoreError>;

    /// Delete a document. Nested collections are left untouched.
    async fn delete(&self, doc: &DocumentPath) -> Result<(), StoreError>;

    /// Read a single document.
    async fn get(&self, doc: &DocumentPath) -> Result<Option<DocumentSnapshot>, StoreError>;

    /// Run a one-shot query.
    async fn query(&self, query: &Query) -> Result<QuerySnapshot, StoreError>;

    /// Start a live query.
    fn listen(&self, query: Query) -> Result<Listener, StoreError>;
}

/// Serialize a value into document fields.
///
/// # Errors
///
/// Returns an error if the value does not serialize to a JSON object.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(serde::ser::Error::custom(
            format!("expected an object, got {other}"),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_compose() {
        let categories = CollectionPath::root("categories");
        let doc = categories.doc("abc");
        assert_eq!(doc.to_string(), "categories/abc");
        assert_eq!(
            doc.subcollection("subcategories").as_str(),
            "categories/abc/subcategories"
        );
        assert_eq!(doc.collection(), &categories);
        assert_eq!(doc.id(), "abc");
    }

    #[test]
    fn test_decode_injects_id() {
        #[derive(Deserialize)]
        struct Named {
            id: String,
            name: String,
        }

        let mut data = Fields::new();
        data.insert("name".into(), Value::String("Rings".into()));
        let snapshot = DocumentSnapshot {
            id: "k1".into(),
            data,
        };

        let named: Named = snapshot.decode().unwrap_or(Named {
            id: String::new(),
            name: String::new(),
        });
        assert_eq!(named.id, "k1");
        assert_eq!(named.name, "Rings");
    }

    #[test]
    fn test_to_fields_rejects_non_objects() {
        assert!(to_fields(&42).is_err());
        assert!(to_fields(&serde_json::json!({"a": 1})).is_ok());
    }
}
