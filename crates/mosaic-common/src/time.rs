//! Time handling for time-stamped granules.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Parse an ISO 8601 timestamp.
///
/// Accepts RFC 3339 (`2024-01-15T12:00:00Z`), a naive datetime which is
/// taken as UTC, or a bare date (midnight UTC).
pub fn parse_iso8601(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    if let Ok(ndt) =
        NaiveDateTime::parse_from_str(&format!("{}T00:00:00", s), "%Y-%m-%dT%H:%M:%S")
    {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// Which time slice of a time-aware mosaic to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSelection {
    /// The most recent time among the granules matching the request.
    Latest,
    /// An exact instant.
    At(DateTime<Utc>),
}

impl TimeSelection {
    /// Parse a request TIME value. `"current"` and `"latest"` select the
    /// most recent slice.
    pub fn parse(s: &str) -> Result<Self, TimeParseError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current" | "latest" => Ok(TimeSelection::Latest),
            _ => parse_iso8601(s).map(TimeSelection::At),
        }
    }
}

impl Default for TimeSelection {
    fn default() -> Self {
        TimeSelection::Latest
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}
