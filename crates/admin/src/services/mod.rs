//! Console services.
//!
//! - [`catalog`] - Live product list with search
//! - [`categories`] - Category tree with selection
//! - [`product_forms`] - Product create/edit flows
//! - [`cms`] - Legal page content
//! - [`dashboard`] - Live product count
//!
//! Services own their listeners and report every command outcome through
//! the shared [`Notifier`](crate::notices::Notifier).

pub mod catalog;
pub mod categories;
pub mod cms;
pub mod dashboard;
pub mod product_forms;

pub use catalog::{CatalogSync, filter_products, products_query};
pub use categories::CategoryTree;
pub use cms::{CmsPages, KNOWN_PAGES, KnownPage, known_page, saved_message};
pub use dashboard::ProductCounter;
pub use product_forms::{ImageUpload, ProductForm, ProductForms};
