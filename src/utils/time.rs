use crate::models::links::parse_millis;
use chrono::{DateTime, Utc};

/// Compact age of an ISO-8601 timestamp relative to `now`: `42s`, `5m`, `3h`, `2d`.
/// Empty for missing or unparseable input; future timestamps read as `0s`.
pub fn format_time_ago(iso: &str, now: DateTime<Utc>) -> String {
    let Some(then) = parse_millis(iso) else {
        return String::new();
    };

    let secs = ((now.timestamp_millis() - then) / 1000).max(0);
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86399 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86400),
    }
}
