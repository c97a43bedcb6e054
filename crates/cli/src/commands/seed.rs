//! Seed the catalog from a YAML fixtures file.
//!
//! # Format
//!
//! ```yaml
//! categories:
//!   - name: Rings
//!     subcategories: [Gold Rings, Silver Rings]
//! products:
//!   - title: Natural Ruby
//!     description: Pigeon blood red
//!     origin: Burma
//!     price: 1500
//!     images: [https://cdn.example.com/ruby.jpg]
//!     category: Rings
//!     subcategory: Gold Rings
//!     featured: true
//! pages:
//!   - slug: privacy-policy
//!     html: <p>Our policy</p>
//! ```
//!
//! Products reference categories by name; the names must appear in the same
//! file. Products are written oldest-first in file order.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use gem_catalog_admin::error::AppError;
use gem_catalog_admin::models::{
    CATEGORIES_COLLECTION, NameFields, NewProduct, PRODUCTS_COLLECTION, SUBCATEGORIES_COLLECTION,
};
use gem_catalog_admin::notices::Notifier;
use gem_catalog_admin::services::CmsPages;
use gem_catalog_admin::store::{CollectionPath, DocumentStore, StoreError, to_fields};
use gem_catalog_core::{CategoryId, ImageList, ImageListError, Price, RequiredName, SubcategoryId};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    /// Fixtures file could not be read.
    #[error("Failed to read fixtures: {0}")]
    Io(#[from] std::io::Error),

    /// Fixtures file is not valid YAML for the expected shape.
    #[error("Invalid fixtures: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A name in the fixtures is blank.
    #[error("Blank name in fixtures")]
    BlankName,

    /// A product references a category that is not in the file.
    #[error("Unknown category {category:?} / {subcategory:?} for product {title:?}")]
    UnknownCategory {
        title: String,
        category: String,
        subcategory: String,
    },

    /// A product has more than five images.
    #[error("Product {0:?}: {1}")]
    Images(String, ImageListError),

    /// Writing to the store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Saving a CMS page failed.
    #[error("CMS error: {0}")]
    Cms(#[from] AppError),
}

/// Top-level fixtures document.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Fixtures {
    pub categories: Vec<CategoryFixture>,
    pub products: Vec<ProductFixture>,
    pub pages: Vec<PageFixture>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryFixture {
    pub name: String,
    #[serde(default)]
    pub subcategories: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProductFixture {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub origin: String,
    pub price: Price,
    #[serde(default)]
    pub images: Vec<String>,
    pub category: String,
    pub subcategory: String,
    #[serde(default)]
    pub featured: bool,
}

#[derive(Debug, Deserialize)]
pub struct PageFixture {
    pub slug: String,
    pub html: String,
}

/// What a seed run wrote.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub subcategories: usize,
    pub products: usize,
    pub pages: usize,
}

type CategoryKey = (String, String);

/// Seed from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, a product
/// references an unknown category, or a write fails.
pub async fn from_file(
    store: &Arc<dyn DocumentStore>,
    path: &Path,
) -> Result<SeedSummary, SeedError> {
    info!(path = %path.display(), "Loading fixtures");
    let content = tokio::fs::read_to_string(path).await?;
    let fixtures: Fixtures = serde_yaml::from_str(&content)?;
    seed(store, fixtures).await
}

/// Write parsed fixtures to the store.
///
/// # Errors
///
/// Same as [`from_file`], minus file errors.
pub async fn seed(
    store: &Arc<dyn DocumentStore>,
    fixtures: Fixtures,
) -> Result<SeedSummary, SeedError> {
    let mut summary = SeedSummary::default();
    let mut placements: HashMap<CategoryKey, (CategoryId, SubcategoryId)> = HashMap::new();
    let categories = CollectionPath::root(CATEGORIES_COLLECTION);

    for category in &fixtures.categories {
        let name = RequiredName::parse(&category.name).map_err(|_| SeedError::BlankName)?;
        let id = store
            .add(&categories, to_fields(&NameFields { name: name.as_str() })?)
            .await?;
        summary.categories += 1;
        debug!(category = %category.name, id = %id, "Seeded category");

        let children = categories.doc(&id).subcollection(SUBCATEGORIES_COLLECTION);
        for sub in &category.subcategories {
            let sub_name = RequiredName::parse(sub).map_err(|_| SeedError::BlankName)?;
            let sub_id = store
                .add(&children, to_fields(&NameFields { name: sub_name.as_str() })?)
                .await?;
            summary.subcategories += 1;
            placements.insert(
                (category.name.clone(), sub.clone()),
                (CategoryId::new(id.as_str()), SubcategoryId::new(sub_id)),
            );
        }
    }

    let products = CollectionPath::root(PRODUCTS_COLLECTION);
    let base = Utc::now();
    for (offset, product) in (0_i64..).zip(fixtures.products) {
        let key = (product.category.clone(), product.subcategory.clone());
        let Some((category_id, subcategory_id)) = placements.get(&key).cloned() else {
            return Err(SeedError::UnknownCategory {
                title: product.title,
                category: product.category,
                subcategory: product.subcategory,
            });
        };
        let images = ImageList::from_urls(product.images)
            .map_err(|e| SeedError::Images(product.title.clone(), e))?;

        let record = NewProduct {
            title: product.title,
            description: product.description,
            origin: product.origin,
            price: product.price,
            images,
            category_id,
            category_name: product.category,
            subcategory_id,
            subcategory_name: product.subcategory,
            is_featured: product.featured,
            created_at: base + Duration::milliseconds(offset),
        };
        store.add(&products, to_fields(&record)?).await?;
        summary.products += 1;
    }

    let pages = CmsPages::new(Arc::clone(store), Notifier::new());
    for page in fixtures.pages {
        pages.save(&page.slug, &page.html).await?;
        summary.pages += 1;
    }

    Ok(summary)
}
