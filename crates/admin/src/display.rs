//! Display helpers for list views.

use chrono::{DateTime, FixedOffset, Utc};

/// Shown in place of a missing value.
pub const PLACEHOLDER: &str = "--";

/// India Standard Time, UTC+05:30.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// The value, or [`PLACEHOLDER`] when it is missing or blank.
#[must_use]
pub fn display_or_placeholder(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => PLACEHOLDER,
    }
}

/// Format a timestamp as an IST calendar date, `DD/MM/YYYY`.
#[must_use]
pub fn format_ist_date(at: Option<DateTime<Utc>>) -> String {
    let (Some(at), Some(ist)) = (at, FixedOffset::east_opt(IST_OFFSET_SECS)) else {
        return PLACEHOLDER.to_string();
    };
    at.with_timezone(&ist).format("%d/%m/%Y").to_string()
}
