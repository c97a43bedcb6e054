//! Product image lists with the five-image cap.

use serde::{Deserialize, Deserializer, Serialize};

/// Maximum number of images a product may reference.
pub const MAX_PRODUCT_IMAGES: usize = 5;

/// Errors raised when an image list would exceed its cap.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageListError {
    /// Adding the images would exceed [`MAX_PRODUCT_IMAGES`].
    #[error("You can only upload up to {MAX_PRODUCT_IMAGES} images.")]
    TooMany {
        /// Images already in the list.
        existing: usize,
        /// Images that were being added.
        added: usize,
    },
}

/// Ordered list of image URLs, never longer than [`MAX_PRODUCT_IMAGES`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ImageList(Vec<String>);

impl ImageList {
    /// Create an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a list from URLs.
    ///
    /// # Errors
    ///
    /// Returns [`ImageListError::TooMany`] if more than five URLs are given.
    pub fn from_urls(urls: Vec<String>) -> Result<Self, ImageListError> {
        Self::check_room(0, urls.len())?;
        Ok(Self(urls))
    }

    /// Check that `added` more images fit after `existing` ones.
    ///
    /// # Errors
    ///
    /// Returns [`ImageListError::TooMany`] when the total would exceed the cap.
    pub const fn check_room(existing: usize, added: usize) -> Result<(), ImageListError> {
        if existing + added > MAX_PRODUCT_IMAGES {
            return Err(ImageListError::TooMany { existing, added });
        }
        Ok(())
    }

    /// Append URLs, leaving the list untouched if they do not all fit.
    ///
    /// # Errors
    ///
    /// Returns [`ImageListError::TooMany`] when the total would exceed the cap.
    pub fn extend(&mut self, urls: Vec<String>) -> Result<(), ImageListError> {
        Self::check_room(self.0.len(), urls.len())?;
        self.0.extend(urls);
        Ok(())
    }

    /// Remaining capacity.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        MAX_PRODUCT_IMAGES.saturating_sub(self.0.len())
    }

    /// Number of images.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list has no images.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First image, used as the list thumbnail.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Iterate over the URLs.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the URLs as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Consumes the list and returns the URLs.
    #[must_use]
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

// Documents written by other tools may carry more than five URLs; reading
// keeps the first five so the invariant holds for every loaded product.
impl<'de> Deserialize<'de> for ImageList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut urls = Vec::<String>::deserialize(deserializer)?;
        urls.truncate(MAX_PRODUCT_IMAGES);
        Ok(Self(urls))
    }
}
