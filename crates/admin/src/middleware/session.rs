//! Session middleware and the per-session console extractor.
//!
//! Sessions are cookie-based and held in memory by tower-sessions. The
//! session only stores the key of its [`Console`]; the console itself lives
//! in the [`Consoles`](crate::console::Consoles) registry on [`AppState`].

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};
use tracing::error;

use crate::config::AdminConfig;
use crate::console::{CONSOLE_IDLE_TIMEOUT, Console};
use crate::error::AppError;
use crate::state::AppState;

/// Session cookie name for admin.
pub const SESSION_COOKIE_NAME: &str = "gem_admin_session";

/// Session key holding the console key.
const CONSOLE_KEY: &str = "console";

/// Create the session layer.
///
/// Cookies are marked secure when uploads are served over HTTPS; this
/// binary serves them, so their scheme is the console's.
#[must_use]
pub fn create_session_layer(config: &AdminConfig) -> SessionManagerLayer<MemoryStore> {
    session_layer(config.storage.public_url.scheme() == "https")
}

/// Session layer with an explicit secure flag.
#[must_use]
pub fn session_layer(secure: bool) -> SessionManagerLayer<MemoryStore> {
    let expiry_seconds = i64::try_from(CONSOLE_IDLE_TIMEOUT.as_secs()).unwrap_or(i64::MAX);

    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(expiry_seconds),
        ))
        .with_secure(secure)
        .with_same_site(SameSite::Strict)
        .with_http_only(true)
        .with_path("/")
}

fn session_error(e: tower_sessions::session::Error) -> AppError {
    error!(error = %e, "Session store failed");
    AppError::Internal(e.to_string())
}

/// Extractor for the console of the requesting session.
///
/// Opens a console on the first request of a session, and again if the
/// previous one has idled out.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CurrentConsole(console): CurrentConsole) -> impl IntoResponse {
///     Json(console.categories().categories())
/// }
/// ```
pub struct CurrentConsole(pub Arc<Console>);

impl FromRequestParts<AppState> for CurrentConsole {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Set by SessionManagerLayer
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer is not installed".to_string()))?;

        let key: Option<String> = session.get(CONSOLE_KEY).await.map_err(session_error)?;
        if let Some(console) = key.as_deref().and_then(|key| state.consoles().get(key)) {
            return Ok(Self(console));
        }

        let (key, console) = state.consoles().open()?;
        session
            .insert(CONSOLE_KEY, key)
            .await
            .map_err(session_error)?;
        Ok(Self(console))
    }
}

/// Close the session's console and clear the session.
///
/// # Errors
///
/// Returns [`AppError::Internal`] if the session store fails.
pub async fn end_console(session: &Session, state: &AppState) -> Result<(), AppError> {
    let key: Option<String> = session.get(CONSOLE_KEY).await.map_err(session_error)?;
    if let Some(key) = key {
        state.consoles().close(&key);
    }
    session.flush().await.map_err(session_error)
}
