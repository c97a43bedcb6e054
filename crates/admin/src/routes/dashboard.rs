//! Dashboard route handler.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::state::AppState;

use super::settle;

/// Build the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/dashboard", get(show))
}

/// Dashboard figures.
#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub product_count: usize,
}

/// Dashboard overview.
pub async fn show(State(state): State<AppState>) -> Json<DashboardView> {
    settle(state.counter().ready()).await;
    Json(DashboardView {
        product_count: state.counter().count(),
    })
}
