//! Middleware for admin.
//!
//! - [`session`] - Cookie sessions and the per-session console extractor

pub mod session;

pub use session::{
    CurrentConsole, SESSION_COOKIE_NAME, create_session_layer, end_console, session_layer,
};
