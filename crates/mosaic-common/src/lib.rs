//! Common types and utilities shared across the raster mosaic crates.

pub mod bbox;
pub mod crs;
pub mod grid;
pub mod time;

pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use grid::{GridToWorld, PixelBounds};
pub use time::{parse_iso8601, TimeSelection};
