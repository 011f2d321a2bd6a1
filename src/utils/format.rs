use chrono::{DateTime, Utc};

/// Formats remaining seconds as `m:ss` (minutes are not capped at 59).
pub fn format_time(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Formats a date as `dd-mm-yyyy` (UTC), as shown in the cooldown notice.
pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("%d-%m-%Y").to_string()
}
