//! Weighted compositing of overlapping tiles.

use super::{Canvas, CompositeMode, CompositingStrategy};
use crate::loader::LoadedTile;

/// Overlapping tiles are averaged. A tile's weight at a pixel is its alpha
/// when it has one, otherwise the pixel's distance to the nearest edge of
/// the granule's full extent, so seams fade instead of cutting and the
/// weight of a pixel does not depend on the request window.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlendStrategy;

impl CompositingStrategy for BlendStrategy {
    fn mode(&self) -> CompositeMode {
        CompositeMode::Blend
    }

    fn composite(&self, tiles: &[LoadedTile], canvas: &mut Canvas) {
        let bands = canvas.raster.bands();
        let pixels = canvas.bounds.area();
        let mut sums = vec![0.0_f64; pixels * bands];
        let mut weights = vec![0.0_f64; pixels];

        for tile in tiles {
            let Some(overlap) = tile.bounds.intersection(&canvas.bounds) else {
                continue;
            };
            // Tile placement inside its granule extent.
            let within = tile.bounds.relative_to(&tile.extent);
            for row in overlap.y..overlap.max_y() {
                for col in overlap.x..overlap.max_x() {
                    let (tc, tr) = (
                        (col - tile.bounds.x) as usize,
                        (row - tile.bounds.y) as usize,
                    );
                    let weight = match &tile.alpha {
                        Some(alpha) => alpha.get(tc, tr) as f64 / u8::MAX as f64,
                        None => edge_distance(
                            within.x as usize + tc,
                            within.y as usize + tr,
                            tile.extent.width,
                            tile.extent.height,
                        ),
                    };
                    let values = tile.raster.pixel(tc, tr);
                    if weight <= 0.0 || values.iter().any(|v| v.is_nan()) {
                        continue;
                    }

                    let (oc, or) = canvas.local(col, row);
                    let idx = or * canvas.bounds.width + oc;
                    weights[idx] += weight;
                    for (sum, v) in sums[idx * bands..(idx + 1) * bands].iter_mut().zip(values) {
                        *sum += v * weight;
                    }
                }
            }
        }

        let sample_type = canvas.raster.layout.sample_type;
        for (idx, &w) in weights.iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            let (oc, or) = (idx % canvas.bounds.width, idx / canvas.bounds.width);
            let sums = &sums[idx * bands..(idx + 1) * bands];
            for (out, sum) in canvas.raster.pixel_mut(oc, or).iter_mut().zip(sums) {
                *out = sample_type.conform(sum / w);
            }
            canvas.mark_covered(oc, or);
        }
    }
}

/// 1 on the outermost ring of a tile, growing by one per ring inward.
fn edge_distance(col: usize, row: usize, width: usize, height: usize) -> f64 {
    let d = (col + 1)
        .min(row + 1)
        .min(width - col)
        .min(height - row);
    d as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{PixelLayout, Raster, SampleType};
    use mosaic_common::{BoundingBox, PixelBounds};

    #[test]
    fn test_edge_distance() {
        assert_eq!(edge_distance(0, 0, 5, 5), 1.0);
        assert_eq!(edge_distance(2, 2, 5, 5), 3.0);
        assert_eq!(edge_distance(4, 2, 5, 5), 1.0);
    }

    fn clipped(extent: PixelBounds, window: PixelBounds, value: f64) -> LoadedTile {
        let bounds = extent.intersection(&window).unwrap();
        LoadedTile {
            granule: "t".into(),
            footprint: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            bounds,
            extent,
            raster: Raster::filled(
                bounds.width,
                bounds.height,
                PixelLayout::component(SampleType::F64, 1),
                &[value],
            ),
            alpha: None,
        }
    }

    fn blend_at(window: PixelBounds, col: i64) -> f64 {
        let a = PixelBounds::new(0, 0, 8, 20);
        let b = PixelBounds::new(4, 0, 8, 20);
        let tiles = vec![clipped(a, window, 10.0), clipped(b, window, 20.0)];
        let layout = PixelLayout::component(SampleType::F64, 1);
        let mut canvas = Canvas::new(window, layout, &[f64::NAN]);
        BlendStrategy.composite(&tiles, &mut canvas);
        let (oc, or) = canvas.local(col, 10);
        canvas.raster.get(oc, or, 0)
    }

    #[test]
    fn test_weights_ignore_request_window() {
        let full = blend_at(PixelBounds::new(0, 0, 12, 20), 5);
        let window = blend_at(PixelBounds::new(5, 0, 2, 20), 5);
        // Column 5 is 3 from A's right edge and 2 from B's left edge.
        assert!((full - 14.0).abs() < 1e-9, "{}", full);
        assert_eq!(full, window);
    }
}
