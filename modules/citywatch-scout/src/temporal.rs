use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Anything dated further ahead than this is treated as unrecoverable.
const MAX_FUTURE_SKEW_SECS: f64 = 86_400.0;

/// Epoch values above this are taken to be milliseconds.
const MILLIS_THRESHOLD: f64 = 100_000_000_000.0;

/// Parse a timestamp the model read from evidence into epoch seconds.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]` (with a space or `T`, read as
/// UTC), `YYYY-MM-DD` (midnight UTC) and raw epoch seconds or milliseconds.
/// Returns `None` for anything else, for negative values, and for instants
/// more than a day after `now`.
pub fn parse_timestamp(raw: &str, now: DateTime<Utc>) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let secs = parse_epoch(raw)
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| epoch_secs(&dt.with_timezone(&Utc)))
        })
        .or_else(|| {
            NAIVE_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|naive| epoch_secs(&naive.and_utc()))
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| epoch_secs(&naive.and_utc()))
        })?;

    let latest = epoch_secs(&now) + MAX_FUTURE_SKEW_SECS;
    (secs.is_finite() && secs >= 0.0 && secs <= latest).then_some(secs)
}

/// Parsed timestamp, or `now` when absent or unrecoverable.
pub fn resolve_timestamp(raw: Option<&str>, now: DateTime<Utc>) -> f64 {
    raw.and_then(|r| parse_timestamp(r, now))
        .unwrap_or_else(|| epoch_secs(&now))
}

pub fn epoch_secs(dt: &DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_micros()) / 1_000_000.0
}

fn parse_epoch(raw: &str) -> Option<f64> {
    if !raw.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let value: f64 = raw.parse().ok()?;
    Some(if value > MILLIS_THRESHOLD {
        value / 1000.0
    } else {
        value
    })
}
