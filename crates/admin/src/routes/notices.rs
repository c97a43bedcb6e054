//! Notice polling and session end.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get},
};
use tower_sessions::Session;

use crate::error::AppError;
use crate::middleware::{CurrentConsole, end_console};
use crate::notices::Notice;
use crate::state::AppState;

/// Build the notices router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notices", get(drain))
        .route("/api/session", delete(end))
}

/// Notices published for this session since its last poll, oldest first.
pub async fn drain(CurrentConsole(console): CurrentConsole) -> Json<Vec<Notice>> {
    Json(console.notifier().drain_recent())
}

/// End the session, releasing its console and listeners.
///
/// # Errors
///
/// Returns 500 if the session store fails.
pub async fn end(State(state): State<AppState>, session: Session) -> Result<StatusCode, AppError> {
    end_console(&session, &state).await?;
    Ok(StatusCode::NO_CONTENT)
}
