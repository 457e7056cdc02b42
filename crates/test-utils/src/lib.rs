//! Shared test utilities for the raster mosaic workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic raster generators
//! - An in-memory granule decoder and a plain-text file decoder
//! - Mosaic fixtures wiring index, decoder and configuration together
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{MosaicFixture, assert_rasters_identical};
//! ```

pub mod decoders;
pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use decoders::*;
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for approximate equality of coordinate pairs.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_coords_approx_eq;
///
/// assert_coords_approx_eq!((1.0001, 2.0001), (1.0, 2.0), 0.001);
/// ```
#[macro_export]
macro_rules! assert_coords_approx_eq {
    (($x1:expr, $y1:expr), ($x2:expr, $y2:expr), $epsilon:expr) => {{
        $crate::assert_approx_eq!($x1, $x2, $epsilon);
        $crate::assert_approx_eq!($y1, $y2, $epsilon);
    }};
}

/// Assert two rasters are pixel-identical. NaN samples compare equal to
/// NaN, unlike `assert_eq!` on the rasters.
#[macro_export]
macro_rules! assert_rasters_identical {
    ($left:expr, $right:expr) => {{
        let left: &mosaic_core::Raster = &$left;
        let right: &mosaic_core::Raster = &$right;
        assert_eq!(
            (left.width, left.height, left.bands()),
            (right.width, right.height, right.bands()),
            "raster shapes differ"
        );
        assert_eq!(left.layout, right.layout, "raster layouts differ");
        if let Some(i) = $crate::first_difference(left, right) {
            panic!(
                "rasters differ at sample {}: left `{:?}`, right `{:?}`",
                i, left.data[i], right.data[i]
            );
        }
    }};
}

/// Index of the first sample that differs bitwise, if any.
pub fn first_difference(left: &mosaic_core::Raster, right: &mosaic_core::Raster) -> Option<usize> {
    left.data
        .iter()
        .zip(&right.data)
        .position(|(a, b)| a.to_bits() != b.to_bits())
}
