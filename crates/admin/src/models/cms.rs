//! CMS page models.

use serde::{Deserialize, Serialize};

/// Collection holding CMS pages, keyed by slug.
pub const CMS_COLLECTION: &str = "cms";

/// Status value written for published pages.
pub const PUBLISHED: u8 = 1;

/// A stored legal page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmsPage {
    pub slug: String,
    /// Page body as HTML.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: u8,
}

/// Whether page content came from the store or the built-in template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSource {
    Stored,
    Default,
}

/// A page ready for editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedPage {
    pub slug: String,
    pub title: &'static str,
    pub html: String,
    pub source: PageSource,
}
