//! First-wins compositing.

use super::{Canvas, CompositeMode, CompositingStrategy};
use crate::loader::LoadedTile;

/// Each output pixel takes the value of the first tile, in input order,
/// whose region of interest covers it.
#[derive(Debug, Default, Clone, Copy)]
pub struct OverlayStrategy;

impl CompositingStrategy for OverlayStrategy {
    fn mode(&self) -> CompositeMode {
        CompositeMode::Overlay
    }

    fn composite(&self, tiles: &[LoadedTile], canvas: &mut Canvas) {
        for tile in tiles {
            let Some(overlap) = tile.bounds.intersection(&canvas.bounds) else {
                continue;
            };
            for row in overlap.y..overlap.max_y() {
                for col in overlap.x..overlap.max_x() {
                    let (oc, or) = canvas.local(col, row);
                    if canvas.is_covered(oc, or) {
                        continue;
                    }
                    let (tc, tr) = (
                        (col - tile.bounds.x) as usize,
                        (row - tile.bounds.y) as usize,
                    );
                    if super::roi_weight(tile, tc, tr) == 0 {
                        continue;
                    }
                    canvas
                        .raster
                        .pixel_mut(oc, or)
                        .copy_from_slice(tile.raster.pixel(tc, tr));
                    canvas.mark_covered(oc, or);
                }
            }
        }
    }
}
