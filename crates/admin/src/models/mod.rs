//! Domain models for the catalog console.
//!
//! - [`product`] - Products and their create/update payloads
//! - [`category`] - Categories, subcategories and product placement
//! - [`cms`] - Legal page content

pub mod category;
pub mod cms;
pub mod product;

pub use category::{
    CATEGORIES_COLLECTION, Category, NameFields, Placement, SUBCATEGORIES_COLLECTION, Subcategory,
};
pub use cms::{CMS_COLLECTION, CmsPage, LoadedPage, PUBLISHED, PageSource};
pub use product::{NewProduct, PRODUCTS_COLLECTION, Product, ProductUpdate};
