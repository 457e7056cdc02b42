//! Error types for the mosaic engine.

use mosaic_index::IndexError;
use thiserror::Error;

/// Errors surfaced to callers of the mosaic reader.
///
/// Per-granule problems never show up here; they are logged and the granule
/// is treated as absent.
#[derive(Error, Debug)]
pub enum MosaicError {
    /// The mosaic cannot be opened.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// More granules matched than the request allows.
    #[error("request matches {matched} granules, maximum is {max}")]
    RequestTooLarge { matched: usize, max: usize },

    /// The request itself is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The index failed to answer a query.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// The reader has been disposed.
    #[error("mosaic reader has been disposed")]
    Disposed,
}

impl MosaicError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }
}

/// Errors raised by a granule decoder.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("granule source not found: {0}")]
    NotFound(String),

    #[error("overview level {level} not available in {location}")]
    MissingLevel { location: String, level: usize },

    #[error("region {region} outside raster of {width}x{height}")]
    RegionOutOfBounds {
        region: String,
        width: usize,
        height: usize,
    },

    #[error("corrupt granule data: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single granule could not contribute to a mosaic.
#[derive(Error, Debug)]
pub enum GranuleLoadError {
    #[error("granule {0} has no location attribute")]
    MissingLocation(String),

    #[error("cannot resolve location '{location}': {reason}")]
    Unresolvable { location: String, reason: String },

    #[error("granule {0} has an empty or invalid footprint")]
    InvalidFootprint(String),

    #[error("no decoder available for '{0}'")]
    NoDecoder(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("decoded tile is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    UnexpectedSize {
        expected_width: usize,
        expected_height: usize,
        actual_width: usize,
        actual_height: usize,
    },
}

/// Result type for mosaic operations.
pub type Result<T> = std::result::Result<T, MosaicError>;
