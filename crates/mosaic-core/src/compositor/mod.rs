//! Mosaic compositing.
//!
//! ```text
//! loaded tiles (submission order)
//!      │
//!      ├─► target layout from the first tile (palette expansion if needed)
//!      │
//!      ├─► conform every tile to that layout
//!      │
//!      ├─► canvas over the output bounds, pre-filled with background
//!      │
//!      └─► strategy (OVERLAY | BLEND) paints tiles through their ROI
//! ```

mod blend;
mod overlay;
mod reconcile;

pub use blend::BlendStrategy;
pub use overlay::OverlayStrategy;
pub use reconcile::expand_palette;

use crate::loader::LoadedTile;
use crate::raster::{PixelLayout, Raster};
use mosaic_common::PixelBounds;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How overlapping tiles are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeMode {
    /// First tile covering a pixel wins.
    Overlay,
    /// Overlapping tiles are weighted and averaged.
    Blend,
}

impl Default for CompositeMode {
    fn default() -> Self {
        Self::Overlay
    }
}

/// A pixel-combination policy.
pub trait CompositingStrategy: Send + Sync {
    fn mode(&self) -> CompositeMode;

    /// Paint `tiles` (already conformed to the canvas layout) onto `canvas`,
    /// marking every pixel that receives a value as covered.
    fn composite(&self, tiles: &[LoadedTile], canvas: &mut Canvas);
}

static OVERLAY: OverlayStrategy = OverlayStrategy;
static BLEND: BlendStrategy = BlendStrategy;

/// Strategy registered for a mode.
pub fn strategy_for(mode: CompositeMode) -> &'static dyn CompositingStrategy {
    match mode {
        CompositeMode::Overlay => &OVERLAY,
        CompositeMode::Blend => &BLEND,
    }
}

/// Output raster under construction.
pub struct Canvas {
    pub bounds: PixelBounds,
    pub raster: Raster,
    covered: Vec<bool>,
}

impl Canvas {
    fn new(bounds: PixelBounds, layout: PixelLayout, background: &[f64]) -> Self {
        Self {
            bounds,
            raster: Raster::filled(bounds.width, bounds.height, layout, background),
            covered: vec![false; bounds.area()],
        }
    }

    /// Canvas-local coordinates of an output-space pixel inside `bounds`.
    pub fn local(&self, col: i64, row: i64) -> (usize, usize) {
        ((col - self.bounds.x) as usize, (row - self.bounds.y) as usize)
    }

    pub fn is_covered(&self, col: usize, row: usize) -> bool {
        self.covered[row * self.bounds.width + col]
    }

    pub fn mark_covered(&mut self, col: usize, row: usize) {
        self.covered[row * self.bounds.width + col] = true;
    }

    pub fn covered_count(&self) -> usize {
        self.covered.iter().filter(|c| **c).count()
    }
}

/// Region-of-interest weight of a tile pixel: 0 outside, alpha inside.
pub(crate) fn roi_weight(tile: &LoadedTile, col: usize, row: usize) -> u8 {
    if col >= tile.raster.width || row >= tile.raster.height {
        return 0;
    }
    match &tile.alpha {
        Some(alpha) => alpha.get(col, row),
        None => u8::MAX,
    }
}

/// Result of compositing.
#[derive(Debug, Clone)]
pub struct Composite {
    pub raster: Raster,
    /// Background actually used, one value per band.
    pub background: Vec<f64>,
    /// Tiles that made it through layout reconciliation.
    pub tiles_used: usize,
    /// Output pixels that received a value from some tile.
    pub covered_pixels: usize,
}

pub struct MosaicCompositor;

impl MosaicCompositor {
    /// Composite with the built-in strategy for `mode`.
    ///
    /// `fallback` gives sample type and band count when no tile loaded.
    pub fn composite(
        tiles: Vec<LoadedTile>,
        bounds: PixelBounds,
        mode: CompositeMode,
        background: Option<&[f64]>,
        fallback: &PixelLayout,
    ) -> Composite {
        Self::composite_with(strategy_for(mode), tiles, bounds, background, fallback)
    }

    pub fn composite_with(
        strategy: &dyn CompositingStrategy,
        tiles: Vec<LoadedTile>,
        bounds: PixelBounds,
        background: Option<&[f64]>,
        fallback: &PixelLayout,
    ) -> Composite {
        let Some(target) = reconcile::target_layout(&tiles, strategy.mode()) else {
            return Self::background_only(bounds, background, fallback);
        };

        let tiles: Vec<LoadedTile> = tiles
            .into_iter()
            .filter_map(|t| reconcile::conform(t, &target))
            .collect();

        let background = background_values(background, &target);
        let mut canvas = Canvas::new(bounds, target, &background);
        strategy.composite(&tiles, &mut canvas);

        let covered_pixels = canvas.covered_count();
        debug!(
            mode = ?strategy.mode(),
            tiles = tiles.len(),
            covered = covered_pixels,
            total = bounds.area(),
            "Composited mosaic"
        );

        Composite {
            raster: canvas.raster,
            background,
            tiles_used: tiles.len(),
            covered_pixels,
        }
    }

    /// Uniform background raster for requests where nothing loaded.
    fn background_only(
        bounds: PixelBounds,
        background: Option<&[f64]>,
        fallback: &PixelLayout,
    ) -> Composite {
        let layout = match background {
            Some(values) if !values.is_empty() => {
                PixelLayout::component(fallback.sample_type, values.len())
            }
            _ => fallback.clone(),
        };
        let background = background_values(background, &layout);
        Composite {
            raster: Raster::filled(bounds.width, bounds.height, layout, &background),
            background,
            tiles_used: 0,
            covered_pixels: 0,
        }
    }
}

/// One background value per band: as given, broadcast from a single value,
/// or the layout's no-data default.
fn background_values(requested: Option<&[f64]>, layout: &PixelLayout) -> Vec<f64> {
    let no_data = layout.sample_type.default_no_data();
    match requested {
        Some(values) if values.len() == layout.bands => values.to_vec(),
        Some([single]) => vec![*single; layout.bands],
        Some(values) => {
            warn!(
                given = values.len(),
                bands = layout.bands,
                "Background does not match band count, using no-data"
            );
            vec![no_data; layout.bands]
        }
        None => vec![no_data; layout.bands],
    }
}
