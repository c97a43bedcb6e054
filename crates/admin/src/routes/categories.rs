//! Category and subcategory route handlers.

use axum::{
    Json, Router,
    extract::Path,
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Serialize;
use tracing::instrument;

use gem_catalog_core::{CategoryId, SubcategoryId};

use crate::error::AppError;
use crate::middleware::CurrentConsole;
use crate::models::{Category, Subcategory};
use crate::state::AppState;

use super::{CreatedResponse, NameRequest, settle};

/// Build the categories router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list).post(create))
        .route("/api/categories/{id}", put(rename).delete(delete))
        .route("/api/categories/{id}/select", post(select))
        .route(
            "/api/subcategories",
            get(list_subcategories).post(create_subcategory),
        )
        .route(
            "/api/subcategories/{id}",
            put(rename_subcategory).delete(delete_subcategory),
        )
}

/// Categories with the session's selection.
#[derive(Debug, Serialize)]
pub struct CategoriesView {
    pub categories: Vec<Category>,
    pub selected: Option<CategoryId>,
}

/// Subcategories of the session's selected category.
#[derive(Debug, Serialize)]
pub struct SubcategoriesView {
    pub category_id: Option<CategoryId>,
    pub subcategories: Vec<Subcategory>,
}

/// List categories.
pub async fn list(CurrentConsole(console): CurrentConsole) -> Json<CategoriesView> {
    let tree = console.categories();
    settle(tree.categories_ready()).await;
    Json(CategoriesView {
        categories: tree.categories(),
        selected: tree.selected_category(),
    })
}

/// Create a category.
///
/// # Errors
///
/// Returns 400 for a blank name or 502 if the write fails.
#[instrument(skip(console, body))]
pub async fn create(
    CurrentConsole(console): CurrentConsole,
    Json(body): Json<NameRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let id = console.categories().create_category(&body.name).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id: id.into_inner(),
        }),
    ))
}

/// Rename a category.
///
/// # Errors
///
/// Returns 400 for a blank name, 404 for an unknown category or 502 if the
/// write fails.
#[instrument(skip(console, body))]
pub async fn rename(
    CurrentConsole(console): CurrentConsole,
    Path(id): Path<CategoryId>,
    Json(body): Json<NameRequest>,
) -> Result<StatusCode, AppError> {
    console.categories().rename_category(&id, &body.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a category.
///
/// # Errors
///
/// Returns 409 when the delete policy refuses or 502 if the delete fails.
#[instrument(skip(console))]
pub async fn delete(
    CurrentConsole(console): CurrentConsole,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode, AppError> {
    console.categories().delete_category(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Select a category.
///
/// # Errors
///
/// Returns 502 if the subcategory listener cannot start.
#[instrument(skip(console))]
pub async fn select(
    CurrentConsole(console): CurrentConsole,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode, AppError> {
    console.categories().select_category(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// List subcategories of the selected category.
pub async fn list_subcategories(CurrentConsole(console): CurrentConsole) -> Json<SubcategoriesView> {
    let tree = console.categories();
    settle(tree.categories_ready()).await;

    let category_id = tree.selected_category();
    if category_id.is_some() {
        settle(tree.subcategories_ready()).await;
    }
    Json(SubcategoriesView {
        category_id,
        subcategories: tree.subcategories(),
    })
}

/// Create a subcategory under the selected category.
///
/// # Errors
///
/// Returns 409 with no selection, 400 for a blank name or 502 if the write
/// fails.
#[instrument(skip(console, body))]
pub async fn create_subcategory(
    CurrentConsole(console): CurrentConsole,
    Json(body): Json<NameRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let id = console.categories().create_subcategory(&body.name).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id: id.into_inner(),
        }),
    ))
}

/// Rename a subcategory of the selected category.
///
/// # Errors
///
/// Same as [`create_subcategory`].
#[instrument(skip(console, body))]
pub async fn rename_subcategory(
    CurrentConsole(console): CurrentConsole,
    Path(id): Path<SubcategoryId>,
    Json(body): Json<NameRequest>,
) -> Result<StatusCode, AppError> {
    console.categories().rename_subcategory(&id, &body.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a subcategory of the selected category.
///
/// # Errors
///
/// Returns 409 with no selection or 502 if the delete fails.
#[instrument(skip(console))]
pub async fn delete_subcategory(
    CurrentConsole(console): CurrentConsole,
    Path(id): Path<SubcategoryId>,
) -> Result<StatusCode, AppError> {
    console.categories().delete_subcategory(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
