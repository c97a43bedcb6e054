//! HTTP route handlers for admin.
//!
//! Every `/api` route except the dashboard works against the console of the
//! requesting session (see [`CurrentConsole`](crate::middleware::CurrentConsole)),
//! so selection, search, submissions and notices are per session. The
//! router must be wrapped in the session layer.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                    - Liveness
//! GET    /health/ready              - Product counter has loaded
//!
//! # Dashboard
//! GET    /api/dashboard             - Product count
//!
//! # Products
//! GET    /api/products?search=      - Live product list
//! POST   /api/products              - Create (multipart, 1-5 images)
//! PATCH  /api/products/{id}         - Edit (multipart, extra images)
//! DELETE /api/products/{id}         - Delete
//!
//! # Categories
//! GET    /api/categories            - Categories and the session's selection
//! POST   /api/categories            - Create
//! PUT    /api/categories/{id}       - Rename
//! DELETE /api/categories/{id}       - Delete (per delete policy)
//! POST   /api/categories/{id}/select - Select
//!
//! # Subcategories (of the session's selected category)
//! GET    /api/subcategories         - List
//! POST   /api/subcategories         - Create
//! PUT    /api/subcategories/{id}    - Rename
//! DELETE /api/subcategories/{id}    - Delete
//!
//! # CMS
//! GET    /api/cms/{slug}            - Load page (stored or default)
//! PUT    /api/cms/{slug}            - Save page
//!
//! # Session
//! GET    /api/notices               - Drain the session's recent notices
//! DELETE /api/session               - End the session and its console
//! ```

use std::future::Future;
use std::time::Duration;

use axum::Router;

use crate::state::AppState;

pub mod categories;
pub mod cms;
pub mod dashboard;
pub mod notices;
pub mod products;

/// How long a handler waits for a listener's first snapshot.
const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(dashboard::router())
        .merge(products::router())
        .merge(categories::router())
        .merge(cms::router())
        .merge(notices::router())
}

/// Wait for a listener to load, giving up after [`READY_TIMEOUT`].
///
/// On timeout the handler serves whatever the mirror holds.
async fn settle(ready: impl Future<Output = ()>) {
    if tokio::time::timeout(READY_TIMEOUT, ready).await.is_err() {
        tracing::warn!("Listener not ready, serving current mirror");
    }
}

/// Request body carrying a name.
#[derive(Debug, serde::Deserialize)]
pub struct NameRequest {
    pub name: String,
}

/// Response for created resources.
#[derive(Debug, serde::Serialize)]
pub struct CreatedResponse {
    pub id: String,
}
