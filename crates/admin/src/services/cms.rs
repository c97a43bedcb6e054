//! Legal page content (privacy policy, terms and conditions).

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::error::AppError;
use crate::models::{CMS_COLLECTION, CmsPage, LoadedPage, PUBLISHED, PageSource};
use crate::notices::Notifier;
use crate::store::{CollectionPath, DocumentStore, to_fields};

/// A page the console knows how to edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownPage {
    pub slug: &'static str,
    pub title: &'static str,
    default_html: &'static str,
}

/// Editable pages, in tab order.
pub const KNOWN_PAGES: [KnownPage; 2] = [
    KnownPage {
        slug: "privacy-policy",
        title: "Privacy Policy",
        default_html: PRIVACY_POLICY_TEMPLATE,
    },
    KnownPage {
        slug: "terms-conditions",
        title: "Terms & Conditions",
        default_html: TERMS_TEMPLATE,
    },
];

const PRIVACY_POLICY_TEMPLATE: &str = "\
<h2>1. Information We Collect</h2>\
<p>We may collect names, email addresses, contact numbers and browsing behavior.</p>\
<h2>2. How We Use Data</h2>\
<p>Data is used to improve the shopping experience and to manage orders and enquiries. \
It is never sold or shared with third parties.</p>\
<h2>3. Data Control &amp; Security</h2>\
<p>Catalog content and customer data are stored with access rules that prevent \
unauthorized access.</p>\
<h2>4. User Rights</h2>\
<p>Contact us at any time to view, edit or delete your personal data.</p>";

const TERMS_TEMPLATE: &str = "\
<h2>1. Acceptance of Terms</h2>\
<p>By using this website you agree to these Terms &amp; Conditions and all applicable laws.</p>\
<h2>2. Use of Content</h2>\
<p>Product information, categories and policies are served from our catalog. \
Unauthorized access or scraping is prohibited.</p>\
<h2>3. Orders &amp; Payments</h2>\
<p>Prices are listed in INR. Orders are confirmed once payment has been received.</p>\
<h2>4. Changes</h2>\
<p>These terms may be updated at any time. Continued use of the site means you accept \
the current version.</p>";

/// Look up an editable page by slug.
#[must_use]
pub fn known_page(slug: &str) -> Option<&'static KnownPage> {
    KNOWN_PAGES.iter().find(|page| page.slug == slug)
}

/// Success notice for a saved page: `"privacy policy" saved successfully`.
///
/// Only the first hyphen in the slug becomes a space.
#[must_use]
pub fn saved_message(slug: &str) -> String {
    format!("\"{}\" saved successfully", slug.replacen('-', " ", 1))
}

/// Load and save legal pages.
pub struct CmsPages {
    store: Arc<dyn DocumentStore>,
    notifier: Notifier,
}

impl std::fmt::Debug for CmsPages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmsPages").finish_non_exhaustive()
    }
}

impl CmsPages {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    fn page(slug: &str) -> Result<&'static KnownPage, AppError> {
        known_page(slug).ok_or_else(|| AppError::NotFound(format!("cms page {slug}")))
    }

    /// Load a page for editing, falling back to its default template.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown slug or
    /// [`AppError::Store`] if the read fails.
    #[instrument(skip(self))]
    pub async fn load(&self, slug: &str) -> Result<LoadedPage, AppError> {
        let page = Self::page(slug)?;
        let doc = CollectionPath::root(CMS_COLLECTION).doc(page.slug);

        let stored = match self.store.get(&doc).await {
            Ok(Some(snapshot)) => snapshot.decode::<CmsPage>(),
            Ok(None) => {
                return Ok(LoadedPage {
                    slug: page.slug.to_string(),
                    title: page.title,
                    html: page.default_html.to_string(),
                    source: PageSource::Default,
                });
            }
            Err(e) => Err(e),
        };

        match stored {
            Ok(stored) => Ok(LoadedPage {
                slug: page.slug.to_string(),
                title: page.title,
                html: stored.description,
                source: PageSource::Stored,
            }),
            Err(e) => {
                error!(error = %e, "Failed to fetch CMS content");
                self.notifier.error("Failed to fetch CMS content");
                Err(e.into())
            }
        }
    }

    /// Store page HTML as published, replacing the whole document.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown slug or
    /// [`AppError::Store`] if the write fails.
    #[instrument(skip(self, html), fields(size = html.len()))]
    pub async fn save(&self, slug: &str, html: &str) -> Result<(), AppError> {
        let page = Self::page(slug)?;
        let record = CmsPage {
            slug: page.slug.to_string(),
            description: html.to_string(),
            status: PUBLISHED,
        };
        let doc = CollectionPath::root(CMS_COLLECTION).doc(page.slug);

        let result = match to_fields(&record) {
            Ok(fields) => self.store.set(&doc, fields).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!("CMS page saved");
                self.notifier.success(saved_message(page.slug));
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to save CMS content");
                self.notifier.error("Failed to save CMS content.");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn pages(store: &MemoryStore) -> (CmsPages, Notifier) {
        let notifier = Notifier::new();
        (CmsPages::new(Arc::new(store.clone()), notifier.clone()), notifier)
    }

    #[test]
    fn test_saved_message_replaces_first_hyphen_only() {
        assert_eq!(
            saved_message("privacy-policy"),
            "\"privacy policy\" saved successfully"
        );
        assert_eq!(saved_message("a-b-c"), "\"a b-c\" saved successfully");
    }

    #[tokio::test]
    async fn test_load_falls_back_to_template() {
        let store = MemoryStore::new();
        let (pages, _) = pages(&store);

        let page = pages.load("terms-conditions").await.unwrap();
        assert_eq!(page.source, PageSource::Default);
        assert_eq!(page.title, "Terms & Conditions");
        assert!(page.html.contains("Acceptance of Terms"));
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let store = MemoryStore::new();
        let (pages, notifier) = pages(&store);

        pages.save("privacy-policy", "<p>Updated</p>").await.unwrap();
        let page = pages.load("privacy-policy").await.unwrap();

        assert_eq!(page.source, PageSource::Stored);
        assert_eq!(page.html, "<p>Updated</p>");

        let doc = store
            .get(&CollectionPath::root(CMS_COLLECTION).doc("privacy-policy"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.data["status"], 1);
        assert_eq!(doc.data["slug"], "privacy-policy");
        assert_eq!(
            notifier.drain_recent()[0].message,
            "\"privacy policy\" saved successfully"
        );
    }

    #[tokio::test]
    async fn test_unknown_slug_is_not_found() {
        let store = MemoryStore::new();
        let (pages, _) = pages(&store);

        assert!(matches!(
            pages.load("shipping").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            pages.save("shipping", "<p/>").await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(store.operations(), 0);
    }
}
