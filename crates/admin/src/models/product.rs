//! Product domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gem_catalog_core::{CategoryId, ImageList, Price, ProductId, SubcategoryId};

/// Collection holding catalog products.
pub const PRODUCTS_COLLECTION: &str = "products";

/// A catalog product as mirrored from the `products` collection.
///
/// Category and subcategory names are copies taken when the product was
/// written; they are not joined against the category tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Document key.
    pub id: ProductId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub price: Price,
    /// Image URLs, at most five.
    #[serde(default)]
    pub images: ImageList,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub subcategory_id: Option<SubcategoryId>,
    #[serde(default)]
    pub subcategory_name: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    /// Insertion time, stored as epoch milliseconds.
    #[serde(
        rename = "created_at",
        default,
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Case-insensitive substring match on title, description or origin.
    ///
    /// `needle` must already be lowercase.
    #[must_use]
    pub fn matches_lowercase(&self, needle: &str) -> bool {
        [&self.title, &self.description, &self.origin]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Fields written when a product is created.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub origin: String,
    pub price: Price,
    pub images: ImageList,
    pub category_id: CategoryId,
    pub category_name: String,
    pub subcategory_id: SubcategoryId,
    pub subcategory_name: String,
    pub is_featured: bool,
    #[serde(rename = "created_at", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Partial update merged into an existing product.
///
/// Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<ImageList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
}

impl ProductUpdate {
    /// Whether the update would write nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.origin.is_none()
            && self.price.is_none()
            && self.images.is_none()
            && self.is_featured.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_product_decodes_sparse_documents() {
        let product: Product = serde_json::from_value(json!({
            "id": "p1",
            "title": "Natural Ruby",
            "price": 1500,
            "created_at": 1_700_000_000_000_i64
        }))
        .unwrap();

        assert_eq!(product.id.as_str(), "p1");
        assert_eq!(product.price, Price::parse("1500").unwrap());
        assert!(product.images.is_empty());
        assert!(product.category_name.is_none());
        assert!(!product.is_featured);
        assert_eq!(
            product.created_at.map(|t| t.timestamp_millis()),
            Some(1_700_000_000_000)
        );
    }

    #[test]
    fn test_new_product_uses_document_field_names() {
        let product = NewProduct {
            title: "Sapphire".into(),
            description: "Blue".into(),
            origin: "Sri Lanka".into(),
            price: Price::parse("2500").unwrap(),
            images: ImageList::new(),
            category_id: CategoryId::new("c1"),
            category_name: "Stones".into(),
            subcategory_id: SubcategoryId::new("s1"),
            subcategory_name: "Blue Stones".into(),
            is_featured: false,
            created_at: DateTime::from_timestamp_millis(42).unwrap(),
        };

        let value = serde_json::to_value(&product).unwrap();
        assert_eq!(value["categoryName"], json!("Stones"));
        assert_eq!(value["subcategoryId"], json!("s1"));
        assert_eq!(value["isFeatured"], json!(false));
        assert_eq!(value["created_at"], json!(42));
        assert!(value["price"].is_number());
    }

    #[test]
    fn test_update_skips_unset_fields() {
        let update = ProductUpdate {
            price: Some(Price::parse("10").unwrap()),
            ..ProductUpdate::default()
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value, json!({"price": 10.0}));
        assert!(ProductUpdate::default().is_empty());
    }

    #[test]
    fn test_matches_lowercase() {
        let product: Product = serde_json::from_value(json!({
            "id": "p1",
            "title": "Natural Ruby",
            "origin": "Burma"
        }))
        .unwrap();
        assert!(product.matches_lowercase("ruby"));
        assert!(product.matches_lowercase("burma"));
        assert!(!product.matches_lowercase("sapphire"));
    }
}
