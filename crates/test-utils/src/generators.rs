//! Test data generators for synthetic granule rasters.
//!
//! These generators create predictable, verifiable pixel patterns so a test
//! can tell from a mosaic sample which granule and which source pixel it
//! came from.

use mosaic_core::{ColorModel, Palette, PixelLayout, Raster, SampleType};
use std::sync::Arc;

/// Creates an `I32` raster with predictable values.
///
/// Each pixel value is calculated as: `offset + row * 1000 + col`
///
/// Giving every granule of a fixture its own `offset` makes every sample of
/// the whole mosaic unique.
///
/// # Example
///
/// ```
/// use test_utils::gradient_raster;
///
/// let raster = gradient_raster(10, 5, 0);
/// assert_eq!(raster.data.len(), 50);
/// assert_eq!(raster.get(0, 0, 0), 0.0);
/// assert_eq!(raster.get(1, 0, 0), 1.0);
/// assert_eq!(raster.get(0, 1, 0), 1000.0);
/// ```
pub fn gradient_raster(width: usize, height: usize, offset: i32) -> Raster {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((offset as i64 + row as i64 * 1000 + col as i64) as f64);
        }
    }
    Raster {
        width,
        height,
        layout: PixelLayout::component(SampleType::I32, 1),
        data,
    }
}

/// Creates a raster where every pixel has the same band values.
pub fn constant_raster(width: usize, height: usize, sample_type: SampleType, values: &[f64]) -> Raster {
    Raster::filled(
        width,
        height,
        PixelLayout::component(sample_type, values.len().max(1)),
        values,
    )
}

/// Creates a three band `U8` raster: red follows the column, green the row
/// and blue is constant.
pub fn rgb_raster(width: usize, height: usize, blue: u8) -> Raster {
    let mut data = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        for col in 0..width {
            data.push((col % 256) as f64);
            data.push((row % 256) as f64);
            data.push(blue as f64);
        }
    }
    Raster {
        width,
        height,
        layout: PixelLayout::component(SampleType::U8, 3),
        data,
    }
}

/// Creates a single band indexed raster with every pixel set to `index`.
pub fn indexed_raster(width: usize, height: usize, palette: Vec<[u8; 4]>, index: u8) -> Raster {
    Raster {
        width,
        height,
        layout: PixelLayout {
            sample_type: SampleType::U8,
            bands: 1,
            color_model: ColorModel::Indexed(Arc::new(Palette::new(palette))),
        },
        data: vec![index as f64; width * height],
    }
}

/// Creates an `F32` raster with pseudo-random values in `[0, 1)`.
///
/// The same seed always produces the same raster.
pub fn noise_raster(width: usize, height: usize, seed: u64) -> Raster {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let h = simple_hash(seed ^ ((row as u64) << 32 | col as u64));
            data.push((h % 10_000) as f64 / 10_000.0);
        }
    }
    Raster {
        width,
        height,
        layout: PixelLayout::component(SampleType::F32, 1),
        data,
    }
}

/// Keeps every `factor`-th pixel, producing the next coarser overview.
///
/// The result is `round(width / factor)` by `round(height / factor)`, the
/// size the loader expects for a level `factor` times coarser.
pub fn decimate(raster: &Raster, factor: usize) -> Raster {
    let factor = factor.max(1);
    let width = ((raster.width as f64 / factor as f64).round() as usize).max(1);
    let height = ((raster.height as f64 / factor as f64).round() as usize).max(1);

    let mut data = Vec::with_capacity(width * height * raster.bands());
    for row in 0..height {
        let src_row = (row * factor).min(raster.height - 1);
        for col in 0..width {
            let src_col = (col * factor).min(raster.width - 1);
            data.extend_from_slice(raster.pixel(src_col, src_row));
        }
    }
    Raster {
        width,
        height,
        layout: raster.layout.clone(),
        data,
    }
}

/// Simple hash function for deterministic pseudo-random values.
fn simple_hash(mut x: u64) -> u64 {
    x = x.wrapping_mul(0x517cc1b727220a95);
    x ^= x >> 32;
    x = x.wrapping_mul(0x517cc1b727220a95);
    x ^= x >> 32;
    x
}
