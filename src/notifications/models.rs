//! Notification record: id assignment and timestamp normalization.

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Length of the random suffix appended to generated ids.
const ID_SUFFIX_LEN: usize = 6;

/// One stored notification event.
///
/// Immutable after creation: the store assigns `id` and `timestamp` at
/// insertion time and nothing mutates the record afterwards. The payload is
/// an open map; producers may attach arbitrary extra fields and they are
/// preserved verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    pub data: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Build a record from a caller payload, assigning the id and timestamp.
    ///
    /// The id is the caller-supplied one if present, otherwise a generated
    /// sortable slug. The timestamp comes from a `timestamp` string field in
    /// the payload when it parses; anything else falls back to now.
    pub fn new(data: Map<String, Value>, custom_id: Option<String>) -> Self {
        let timestamp = data
            .get("timestamp")
            .and_then(Value::as_str)
            .map(normalize_timestamp)
            .unwrap_or_else(Utc::now);
        Self {
            id: custom_id.unwrap_or_else(generate_id),
            data,
            timestamp,
        }
    }
}

/// Generate a sortable notification id.
///
/// UTC date and time down to milliseconds, plus a short random suffix so that
/// two notifications created in the same millisecond still get distinct ids.
pub fn generate_id() -> String {
    let slug = Utc::now().format("%Y%m%d-%H%M%S%.3f");
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{}-{}", slug, suffix.to_lowercase())
}

/// Parse a caller-supplied timestamp into a timezone-aware UTC instant.
///
/// Accepts RFC 3339 with an offset; naive timestamps are assumed UTC.
/// Unparsable input falls back to now, a malformed timestamp never rejects
/// the notification.
pub fn normalize_timestamp(raw: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return naive.and_utc();
        }
    }
    Utc::now()
}
