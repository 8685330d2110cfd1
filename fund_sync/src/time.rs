//! Timestamp formatting helpers.
//!
//! All database writes are RFC 3339 UTC strings with millisecond precision
//! and a trailing `Z`, which keeps lexicographic ordering equal to temporal
//! ordering — the staleness scan relies on that.

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};

/// Format a UTC datetime as an RFC 3339 string with millisecond precision.
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// The current instant, formatted for a database column.
pub fn now_rfc3339_millis() -> String {
    to_rfc3339_millis(Utc::now())
}

/// Parse an RFC 3339 timestamp back into a UTC datetime.
pub fn parse_rfc3339(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

/// Format a date for a `YYYY-MM-DD` text column.
pub fn to_ymd(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}
