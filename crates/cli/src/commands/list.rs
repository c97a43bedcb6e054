//! Read-only views of the catalog.

#![allow(clippy::print_stdout)]

use std::sync::Arc;
use std::time::Duration;

use gem_catalog_admin::display::{display_or_placeholder, format_ist_date};
use gem_catalog_admin::error::AppError;
use gem_catalog_admin::models::{
    CATEGORIES_COLLECTION, Category, PageSource, SUBCATEGORIES_COLLECTION, Subcategory,
};
use gem_catalog_admin::notices::Notifier;
use gem_catalog_admin::services::{CatalogSync, CmsPages};
use gem_catalog_admin::store::{CollectionPath, Direction, DocumentStore, Query};

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

/// Print the product list the console would show for `search`.
///
/// # Errors
///
/// Returns an error if the listener cannot be attached or no snapshot
/// arrives in time.
pub async fn products(store: &Arc<dyn DocumentStore>, search: &str) -> Result<(), AppError> {
    let catalog = CatalogSync::new(Arc::clone(store), Notifier::new());
    catalog.subscribe(search)?;
    tokio::time::timeout(SNAPSHOT_TIMEOUT, catalog.ready())
        .await
        .map_err(|_| AppError::Internal("timed out waiting for products".to_string()))?;

    let products = catalog.list();
    catalog.unsubscribe();

    println!(
        "{:<20} {:<32} {:>12} {:<14} {:<24} {:<10} {}",
        "ID", "TITLE", "PRICE", "ORIGIN", "CATEGORY", "ADDED", "FEATURED"
    );
    for product in &products {
        let placement = format!(
            "{} / {}",
            display_or_placeholder(product.category_name.as_deref()),
            display_or_placeholder(product.subcategory_name.as_deref()),
        );
        println!(
            "{:<20} {:<32} {:>12} {:<14} {:<24} {:<10} {}",
            product.id,
            product.title,
            product.price.display_inr(),
            product.origin,
            placement,
            format_ist_date(product.created_at),
            if product.is_featured { "yes" } else { "" },
        );
    }
    println!("\n{} product(s)", products.len());
    Ok(())
}

/// Print every category with its subcategories, ordered by name.
///
/// # Errors
///
/// Returns an error if a query fails.
pub async fn categories(store: &Arc<dyn DocumentStore>) -> Result<(), AppError> {
    let root = CollectionPath::root(CATEGORIES_COLLECTION);
    let snapshot = store
        .query(&Query::collection(root.clone()).order_by("name", Direction::Ascending))
        .await?;

    for doc in &snapshot.docs {
        let category: Category = doc.decode()?;
        println!("{} ({})", category.name, category.id);

        let children = root.doc(&category.id).subcollection(SUBCATEGORIES_COLLECTION);
        let subs = store
            .query(&Query::collection(children).order_by("name", Direction::Ascending))
            .await?;
        for sub in &subs.docs {
            let sub: Subcategory = sub.decode()?;
            println!("  - {} ({})", sub.name, sub.id);
        }
    }

    if snapshot.is_empty() {
        println!("No categories");
    }
    Ok(())
}

/// Print a CMS page's HTML.
///
/// # Errors
///
/// Returns an error for an unknown slug or a failed read.
pub async fn cms_page(store: &Arc<dyn DocumentStore>, slug: &str) -> Result<(), AppError> {
    let page = CmsPages::new(Arc::clone(store), Notifier::new())
        .load(slug)
        .await?;

    let source = match page.source {
        PageSource::Stored => "stored",
        PageSource::Default => "default template",
    };
    println!("# {} ({source})\n", page.title);
    println!("{}", page.html);
    Ok(())
}
