//! Product route handlers.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, multipart::MultipartError},
    http::StatusCode,
    routing::{get, patch},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use gem_catalog_core::{CategoryId, Price, ProductId, SubcategoryId};

use crate::console::Console;
use crate::display::{display_or_placeholder, format_ist_date};
use crate::error::{AppError, ValidationError};
use crate::middleware::CurrentConsole;
use crate::models::Product;
use crate::services::{ImageUpload, ProductForm};
use crate::state::AppState;

use super::{CreatedResponse, settle};

/// Request body cap for product forms (five images plus fields).
const MAX_FORM_BYTES: usize = 50 * 1024 * 1024;

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list).post(create))
        .route("/api/products/{id}", patch(edit).delete(delete))
        .layer(DefaultBodyLimit::max(MAX_FORM_BYTES))
}

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

/// Product row for list views.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub origin: String,
    pub price: Price,
    pub price_display: String,
    pub images: Vec<String>,
    pub thumbnail: Option<String>,
    pub category: String,
    pub subcategory: String,
    pub is_featured: bool,
    pub created: String,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            title: product.title.clone(),
            description: product.description.clone(),
            origin: product.origin.clone(),
            price: product.price,
            price_display: product.price.display_inr(),
            images: product.images.as_slice().to_vec(),
            thumbnail: product.images.first().map(str::to_string),
            category: display_or_placeholder(product.category_name.as_deref()).to_string(),
            subcategory: display_or_placeholder(product.subcategory_name.as_deref()).to_string(),
            is_featured: product.is_featured,
            created: format_ist_date(product.created_at),
        }
    }
}

/// Product list response.
#[derive(Debug, Serialize)]
pub struct ProductListView {
    pub search: String,
    pub products: Vec<ProductView>,
}

/// List products, switching the session's live subscription to `search`.
///
/// # Errors
///
/// Returns 502 if the store refuses the subscription.
#[instrument(skip(console))]
pub async fn list(
    CurrentConsole(console): CurrentConsole,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ProductListView>, AppError> {
    let search = query.search.unwrap_or_default();
    let _turn = console.search_turn().await;
    let catalog = console.catalog();
    catalog.subscribe(&search)?;
    settle(catalog.ready()).await;

    Ok(Json(ProductListView {
        products: catalog.list().iter().map(ProductView::from).collect(),
        search,
    }))
}

/// Parsed multipart product form.
#[derive(Debug, Default)]
struct Submission {
    form: ProductForm,
    category_id: Option<String>,
    subcategory_id: Option<String>,
}

fn bad_multipart(e: MultipartError) -> AppError {
    AppError::BadRequest(e.to_string())
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "true" | "on" | "1")
}

async fn read_submission(mut multipart: Multipart) -> Result<Submission, AppError> {
    let mut submission = Submission::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" => {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                if bytes.is_empty() {
                    continue;
                }
                submission.form.images.push(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "title" => submission.form.title = field.text().await.map_err(bad_multipart)?,
            "description" => {
                submission.form.description = field.text().await.map_err(bad_multipart)?;
            }
            "origin" => submission.form.origin = field.text().await.map_err(bad_multipart)?,
            "price" => submission.form.price = field.text().await.map_err(bad_multipart)?,
            "isFeatured" | "is_featured" => {
                let value = field.text().await.map_err(bad_multipart)?;
                submission.form.is_featured = Some(parse_flag(&value));
            }
            "categoryId" | "category_id" => {
                submission.category_id = Some(field.text().await.map_err(bad_multipart)?);
            }
            "subcategoryId" | "subcategory_id" => {
                submission.subcategory_id = Some(field.text().await.map_err(bad_multipart)?);
            }
            other => debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(submission)
}

fn required_id(
    console: &Console,
    value: Option<String>,
    field: &'static str,
) -> Result<String, AppError> {
    match value {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => {
            let err = ValidationError::Required(field);
            console.notifier().warning(err.to_string());
            Err(err.into())
        }
    }
}

/// Create a product.
///
/// # Errors
///
/// Returns 400 for invalid input, 404 if the category or subcategory does
/// not exist, 409 while another submission from the same session runs, or
/// 502 if an upload or the write fails.
#[instrument(skip(console, multipart))]
pub async fn create(
    CurrentConsole(console): CurrentConsole,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let submission = read_submission(multipart).await?;
    let category_id = CategoryId::new(required_id(&console, submission.category_id, "Category")?);
    let subcategory_id = SubcategoryId::new(required_id(
        &console,
        submission.subcategory_id,
        "Sub-category",
    )?);

    let placement = console
        .categories()
        .resolve_placement(&category_id, &subcategory_id)
        .await?;
    let id = console.forms().create(submission.form, placement).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id: id.into_inner(),
        }),
    ))
}

/// Edit a product.
///
/// # Errors
///
/// Returns 400 for invalid input or too many images, 404 for an unknown
/// product, 409 while another submission from the same session runs, or 502
/// if an upload or the write fails.
#[instrument(skip(console, multipart))]
pub async fn edit(
    CurrentConsole(console): CurrentConsole,
    Path(id): Path<ProductId>,
    multipart: Multipart,
) -> Result<StatusCode, AppError> {
    let submission = read_submission(multipart).await?;
    console
        .forms()
        .edit(console.catalog(), &id, submission.form)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a product.
///
/// # Errors
///
/// Returns 502 if the delete fails.
#[instrument(skip(console))]
pub async fn delete(
    CurrentConsole(console): CurrentConsole,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    console.catalog().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" on "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
