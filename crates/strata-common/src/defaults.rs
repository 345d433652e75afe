//! Process-wide defaults.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

/// Environment variable that pins the build timestamp for reproducible images.
pub const SOURCE_DATE_EPOCH_ENV: &str = "SOURCE_DATE_EPOCH";

/// Timestamp used for blank history entries and reproducible images:
/// 1980-01-01T00:00:01Z.
pub static NORMALIZED_DATE_TIME: Lazy<DateTime<Utc>> =
    Lazy::new(|| DateTime::<Utc>::from_timestamp(315_532_801, 0).unwrap_or_default());

static SOURCE_DATE_EPOCH: Lazy<Option<DateTime<Utc>>> = Lazy::new(|| {
    let raw = std::env::var(SOURCE_DATE_EPOCH_ENV).ok()?;
    let parsed = parse_source_date_epoch(&raw);
    if parsed.is_none() {
        tracing::warn!(value = %raw, "Ignoring invalid {}", SOURCE_DATE_EPOCH_ENV);
    }
    parsed
});

/// Default build timestamp for a new session.
///
/// `SOURCE_DATE_EPOCH` wins when it holds a valid Unix timestamp;
/// otherwise the normalized date-time is used.
#[must_use]
pub fn default_created_at() -> DateTime<Utc> {
    SOURCE_DATE_EPOCH.unwrap_or(*NORMALIZED_DATE_TIME)
}

/// Parse a `SOURCE_DATE_EPOCH` value (seconds since the Unix epoch).
#[must_use]
pub fn parse_source_date_epoch(value: &str) -> Option<DateTime<Utc>> {
    let secs = value.trim().parse::<i64>().ok()?;
    DateTime::<Utc>::from_timestamp(secs, 0)
}
