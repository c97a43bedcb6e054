//! Object storage for product images.
//!
//! Images are uploaded before the product document that references them is
//! written, so a stored product only ever points at blobs that exist.
//!
//! # Implementations
//!
//! - [`LocalObjectStorage`] - Files under a directory served at a public URL

pub mod local;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub use local::LocalObjectStorage;

/// Errors that can occur while storing a blob.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Object key is empty or escapes the storage root.
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// The blob was declared with a non-image content type.
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// Writing the blob failed.
    #[error("upload failed: {0}")]
    Io(#[from] std::io::Error),

    /// The public URL for the blob could not be built.
    #[error("invalid public url: {0}")]
    Url(#[from] url::ParseError),
}

/// Accepts a named blob and returns the URL it can be fetched from.
#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    /// Store `bytes` under `key` and return its public URL.
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<Url, StorageError>;
}

/// Whether a declared content type names an image (`image/*`).
///
/// A missing content type is accepted; browsers omit it for unknown files.
#[must_use]
pub fn is_image_content_type(content_type: Option<&str>) -> bool {
    content_type.is_none_or(|ct| {
        ct.split(';')
            .next()
            .and_then(|essence| essence.trim().split_once('/'))
            .is_some_and(|(kind, sub)| kind.eq_ignore_ascii_case("image") && !sub.is_empty())
    })
}

/// Object key for a product image: `products/{millis}-{file name}`.
///
/// The file name is reduced to ASCII letters, digits, `.`, `-` and `_` so
/// the key cannot introduce extra path segments.
#[must_use]
pub fn product_image_key(millis: i64, file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    let mut clean: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if clean.trim_matches('.').is_empty() {
        clean = "image".to_string();
    }
    format!("products/{millis}-{clean}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_content_type() {
        assert!(is_image_content_type(None));
        assert!(is_image_content_type(Some("image/jpeg")));
        assert!(is_image_content_type(Some("IMAGE/PNG; charset=binary")));
        assert!(!is_image_content_type(Some("text/plain")));
        assert!(!is_image_content_type(Some("image/")));
        assert!(!is_image_content_type(Some("image")));
    }

    #[test]
    fn test_product_image_key() {
        assert_eq!(
            product_image_key(1_700_000_000_000, "ruby.jpg"),
            "products/1700000000000-ruby.jpg"
        );
    }

    #[test]
    fn test_product_image_key_strips_paths_and_spaces() {
        assert_eq!(
            product_image_key(5, "../../etc/my ring (1).png"),
            "products/5-my-ring--1-.png"
        );
        assert_eq!(product_image_key(5, "C:\\photos\\a.png"), "products/5-a.png");
    }

    #[test]
    fn test_product_image_key_fallback_name() {
        assert_eq!(product_image_key(5, ""), "products/5-image");
        assert_eq!(product_image_key(5, ".."), "products/5-image");
    }
}
