use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer};

/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current UTC time as an RFC 3339 string (millisecond precision, `Z` suffix)
pub fn now_rfc3339() -> String {
    to_rfc3339(Utc::now())
}

/// Format a UTC timestamp the way records store it
pub fn to_rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a record timestamp into epoch milliseconds.
///
/// Accepted, in order:
/// - RFC 3339 (`2024-05-01T12:00:00Z`, `2024-05-01T14:00:00+02:00`)
/// - naive `YYYY-MM-DD HH:MM:SS[.f]` or `YYYY-MM-DDTHH:MM:SS[.f]`, read as UTC
/// - integer epoch milliseconds
///
/// Returns `None` for anything else, including blank strings.
pub fn parse_timestamp_millis(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }

    raw.parse::<i64>().ok()
}

/// Normalize a record reference (`current_order_id`, `table_id`).
///
/// Trims the value; empty strings and the literal texts `null` / `undefined`
/// (any case) count as absent.
pub fn normalize_ref(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed.eq_ignore_ascii_case("undefined")
    {
        return None;
    }
    Some(trimmed.to_string())
}

/// Deserialize a string field (ids, statuses) that may arrive as a JSON string or number.
///
/// Offline caches and older clients send numeric ids; booleans, arrays and
/// objects are treated as absent rather than failing the whole record.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(lenient_text))
}

/// Text of a JSON string or number; anything else is absent
pub fn lenient_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Deserialize a field where "absent" and "explicit null" mean different things.
///
/// Use together with `#[serde(default)]`: a missing key stays `None`,
/// `null` becomes `Some(None)`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
