use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::DateTime;

fn since_epoch() -> Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()
}

/// Current Unix time in whole seconds.
pub fn current_unix_timestamp() -> u64 {
    since_epoch().as_secs()
}

/// Current Unix time in milliseconds, saturating on overflow.
pub fn current_unix_timestamp_ms() -> u64 {
    u64::try_from(since_epoch().as_millis()).unwrap_or(u64::MAX)
}

/// Parses an RFC3339 timestamp (the shape GitHub emits) to Unix seconds.
///
/// Returns `None` for missing, malformed, or pre-epoch input so webhook
/// handlers can fall back to "now" without erroring.
pub fn parse_rfc3339_to_unix(value: &str) -> Option<u64> {
    let parsed = DateTime::parse_from_rfc3339(value.trim()).ok()?;
    u64::try_from(parsed.timestamp()).ok()
}
