//! Category and subcategory domain models.

use serde::{Deserialize, Serialize};

use gem_catalog_core::{CategoryId, SubcategoryId};

/// Collection holding top-level categories.
pub const CATEGORIES_COLLECTION: &str = "categories";

/// Name of the subcollection nested under each category.
pub const SUBCATEGORIES_COLLECTION: &str = "subcategories";

/// A top-level category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Document key.
    pub id: CategoryId,
    #[serde(default)]
    pub name: String,
}

/// A subcategory, scoped to its parent category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcategory {
    /// Document key within the parent's subcollection.
    pub id: SubcategoryId,
    #[serde(default)]
    pub name: String,
}

/// Fields written for a category or subcategory.
#[derive(Debug, Clone, Serialize)]
pub struct NameFields<'a> {
    pub name: &'a str,
}

/// Where a new product is filed, with the names copied onto the product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub category: Category,
    pub subcategory: Subcategory,
}
