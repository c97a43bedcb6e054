//! Unified error handling for admin.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use gem_catalog_core::{ImageListError, NameError, PriceError};

use crate::storage::StorageError;
use crate::store::StoreError;

/// Form input rejected before any remote call.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field was blank.
    #[error("{0} is required")]
    Required(&'static str),

    /// The price field did not parse.
    #[error("{0}")]
    Price(#[from] PriceError),

    /// Too many images.
    #[error(transparent)]
    Images(#[from] ImageListError),

    /// A new product needs at least one image.
    #[error("At least one image is required")]
    NoImages,

    /// An attached file is not declared as an image.
    #[error("{0} is not an image")]
    NotAnImage(String),

    /// A category or subcategory name was blank.
    #[error("{0}")]
    Name(#[from] NameError),
}

/// Application-level error type for the admin console.
#[derive(Debug, Error)]
pub enum AppError {
    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Document store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Image upload failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A subcategory operation was attempted with no category selected.
    #[error("No category selected")]
    NoCategorySelected,

    /// A product submission is already in flight.
    #[error("A submission is already in progress")]
    SubmissionPending,

    /// The delete policy refused to delete a category.
    #[error("Delete blocked: {0}")]
    DeleteBlocked(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NoCategorySelected | Self::SubmissionPending | Self::DeleteBlocked(_) => {
                StatusCode::CONFLICT
            }
            Self::NotFound(_) | Self::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Storage(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Internal(_) | Self::Storage(_) | Self::Store(StoreError::Io(_))
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Store(StoreError::NotFound(_)) => self.to_string(),
            Self::Store(_) | Self::Storage(_) => "External service error".to_string(),
            Self::Validation(e) => e.to_string(),
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
