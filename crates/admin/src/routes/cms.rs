//! CMS page route handlers.

use axum::{
    Json, Router,
    extract::Path,
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::CurrentConsole;
use crate::models::LoadedPage;
use crate::state::AppState;

/// Build the CMS router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/cms/{slug}", get(show).put(save))
}

/// Request for saving a page.
#[derive(Debug, Deserialize)]
pub struct SavePageRequest {
    pub html: String,
}

/// Load a page for editing.
///
/// # Errors
///
/// Returns 404 for an unknown slug.
#[instrument(skip(console))]
pub async fn show(
    CurrentConsole(console): CurrentConsole,
    Path(slug): Path<String>,
) -> Result<Json<LoadedPage>, AppError> {
    Ok(Json(console.cms().load(&slug).await?))
}

/// Save a page.
///
/// # Errors
///
/// Returns 404 for an unknown slug or 502 if the write fails.
#[instrument(skip(console, body))]
pub async fn save(
    CurrentConsole(console): CurrentConsole,
    Path(slug): Path<String>,
    Json(body): Json<SavePageRequest>,
) -> Result<StatusCode, AppError> {
    console.cms().save(&slug, &body.html).await?;
    Ok(StatusCode::NO_CONTENT)
}
