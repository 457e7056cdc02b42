//! Coordinate Reference System identity.
//!
//! Only the identity of the CRS travels with a mosaic; reprojection is the
//! job of an external library.

use serde::{Deserialize, Serialize};
use std::fmt;

/// CRS identifier attached to a mosaic and its responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
    /// NAD83 Geographic
    Epsg4269,
    /// Any other EPSG code
    Epsg(u32),
}

impl CrsCode {
    /// Parse a CRS string.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326"
    /// - "epsg:32633"
    /// - "CRS:84" (equivalent to EPSG:4326)
    pub fn from_crs_string(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();

        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" => return Ok(CrsCode::Epsg4326),
            "EPSG:3857" | "EPSG:900913" => return Ok(CrsCode::Epsg3857),
            "EPSG:4269" => return Ok(CrsCode::Epsg4269),
            _ => {}
        }

        normalized
            .strip_prefix("EPSG:")
            .and_then(|code| code.parse::<u32>().ok())
            .map(CrsCode::Epsg)
            .ok_or_else(|| CrsParseError::UnsupportedCrs(s.to_string()))
    }

    /// Numeric EPSG code.
    pub fn epsg(&self) -> u32 {
        match self {
            CrsCode::Epsg4326 => 4326,
            CrsCode::Epsg3857 => 3857,
            CrsCode::Epsg4269 => 4269,
            CrsCode::Epsg(code) => *code,
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326 | CrsCode::Epsg4269)
    }
}

impl Default for CrsCode {
    fn default() -> Self {
        CrsCode::Epsg4326
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}
