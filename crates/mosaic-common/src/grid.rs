//! Raster grid geometry: affine pixel-to-world transforms and integer
//! pixel rectangles.
//!
//! Pixel coordinates use the corner convention: pixel `(col, row)` covers
//! the half-open square `[col, col + 1) x [row, row + 1)` and its upper-left
//! corner maps to `pixel_to_world(col, row)`.

use crate::bbox::BoundingBox;
use serde::{Deserialize, Serialize};

/// Values this close to an integer are snapped before floor/ceil so that
/// aligned requests don't grow by a pixel from float noise.
const SNAP_EPSILON: f64 = 1e-6;

/// Affine transform from pixel space to world space.
///
/// ```text
/// x = scale_x * col + shear_x * row + translate_x
/// y = shear_y * col + scale_y * row + translate_y
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridToWorld {
    pub scale_x: f64,
    pub shear_x: f64,
    pub translate_x: f64,
    pub shear_y: f64,
    pub scale_y: f64,
    pub translate_y: f64,
}

impl GridToWorld {
    /// North-up transform with the upper-left corner at `(origin_x, origin_y)`.
    /// Resolutions are positive cell sizes.
    pub fn north_up(origin_x: f64, origin_y: f64, res_x: f64, res_y: f64) -> Self {
        Self {
            scale_x: res_x,
            shear_x: 0.0,
            translate_x: origin_x,
            shear_y: 0.0,
            scale_y: -res_y,
            translate_y: origin_y,
        }
    }

    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.scale_x * col + self.shear_x * row + self.translate_x,
            self.shear_y * col + self.scale_y * row + self.translate_y,
        )
    }

    /// Inverse mapping; `None` when the transform is singular.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let dx = x - self.translate_x;
        let dy = y - self.translate_y;
        let col = (self.scale_y * dx - self.shear_x * dy) / det;
        let row = (self.scale_x * dy - self.shear_y * dx) / det;
        Some((col, row))
    }

    fn determinant(&self) -> f64 {
        self.scale_x * self.scale_y - self.shear_x * self.shear_y
    }

    /// Cell size along each axis.
    pub fn resolution(&self) -> (f64, f64) {
        (
            self.scale_x.hypot(self.shear_y),
            self.shear_x.hypot(self.scale_y),
        )
    }

    /// Transform for the same grid read with the given subsampling factors.
    pub fn scaled(&self, factor_x: f64, factor_y: f64) -> Self {
        Self {
            scale_x: self.scale_x * factor_x,
            shear_x: self.shear_x * factor_y,
            translate_x: self.translate_x,
            shear_y: self.shear_y * factor_x,
            scale_y: self.scale_y * factor_y,
            translate_y: self.translate_y,
        }
    }

    /// World envelope covered by a pixel rectangle.
    pub fn pixel_bounds_to_world(&self, bounds: &PixelBounds) -> BoundingBox {
        let x0 = bounds.x as f64;
        let y0 = bounds.y as f64;
        let x1 = bounds.max_x() as f64;
        let y1 = bounds.max_y() as f64;
        let corners = [
            self.pixel_to_world(x0, y0),
            self.pixel_to_world(x1, y0),
            self.pixel_to_world(x0, y1),
            self.pixel_to_world(x1, y1),
        ];
        envelope(&corners)
    }

    /// Smallest pixel rectangle covering `bbox`, rounded outward and never
    /// smaller than 1x1. `None` when the rectangle is not representable in
    /// integer pixel space.
    pub fn world_to_pixel_bounds(&self, bbox: &BoundingBox) -> Option<PixelBounds> {
        let corners = [
            self.world_to_pixel(bbox.min_x, bbox.max_y)?,
            self.world_to_pixel(bbox.max_x, bbox.max_y)?,
            self.world_to_pixel(bbox.min_x, bbox.min_y)?,
            self.world_to_pixel(bbox.max_x, bbox.min_y)?,
        ];
        let env = envelope(&corners);
        if !env.is_valid() {
            return None;
        }

        let x0 = to_pixel(snap(env.min_x).floor())?;
        let y0 = to_pixel(snap(env.min_y).floor())?;
        let x1 = to_pixel(snap(env.max_x).ceil())?.max(x0 + 1);
        let y1 = to_pixel(snap(env.max_y).ceil())?.max(y0 + 1);

        Some(PixelBounds::new(x0, y0, (x1 - x0) as usize, (y1 - y0) as usize))
    }

    /// Pixel rectangle whose centres fall inside `bbox`, right and bottom
    /// edges exclusive. Unclipped, so it may extend past any output raster.
    pub fn centre_pixel_bounds(&self, bbox: &BoundingBox) -> Option<PixelBounds> {
        let ul = self.world_to_pixel(bbox.min_x, bbox.max_y)?;
        let lr = self.world_to_pixel(bbox.max_x, bbox.min_y)?;

        let (x0, x1) = (ul.0.min(lr.0), ul.0.max(lr.0));
        let (y0, y1) = (ul.1.min(lr.1), ul.1.max(lr.1));

        // Centre c + 0.5 in [x0, x1)  <=>  c in [ceil(x0 - 0.5), ceil(x1 - 0.5))
        let c0 = to_pixel((x0 - 0.5).ceil())?;
        let c1 = to_pixel((x1 - 0.5).ceil())?;
        let r0 = to_pixel((y0 - 0.5).ceil())?;
        let r1 = to_pixel((y1 - 0.5).ceil())?;
        if c1 <= c0 || r1 <= r0 {
            return None;
        }
        Some(PixelBounds::new(c0, r0, (c1 - c0) as usize, (r1 - r0) as usize))
    }
}

fn snap(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < SNAP_EPSILON {
        r
    } else {
        v
    }
}

/// Pixel coordinates stay within +-2^52 so that edges, widths and their
/// differences never overflow.
fn to_pixel(v: f64) -> Option<i64> {
    const LIMIT: f64 = (1u64 << 52) as f64;
    (v.is_finite() && v.abs() <= LIMIT).then(|| v as i64)
}

fn envelope(points: &[(f64, f64)]) -> BoundingBox {
    let mut bbox = BoundingBox::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in points {
        bbox.min_x = bbox.min_x.min(x);
        bbox.min_y = bbox.min_y.min(y);
        bbox.max_x = bbox.max_x.max(x);
        bbox.max_y = bbox.max_y.max(y);
    }
    bbox
}

/// Integer pixel rectangle. `x`/`y` may be negative when the rectangle
/// lies partly outside a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelBounds {
    pub x: i64,
    pub y: i64,
    pub width: usize,
    pub height: usize,
}

impl PixelBounds {
    pub fn new(x: i64, y: i64, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge.
    pub fn max_x(&self) -> i64 {
        self.x + self.width as i64
    }

    /// Exclusive bottom edge.
    pub fn max_y(&self) -> i64 {
        self.y + self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Pixel count, `None` on overflow.
    pub fn checked_area(&self) -> Option<usize> {
        self.width.checked_mul(self.height)
    }

    pub fn contains(&self, col: i64, row: i64) -> bool {
        col >= self.x && col < self.max_x() && row >= self.y && row < self.max_y()
    }

    /// Overlapping rectangle, `None` if they share no pixel.
    pub fn intersection(&self, other: &PixelBounds) -> Option<PixelBounds> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.max_x().min(other.max_x());
        let y1 = self.max_y().min(other.max_y());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(PixelBounds::new(x0, y0, (x1 - x0) as usize, (y1 - y0) as usize))
    }

    /// Same rectangle moved so that `origin` becomes (0, 0).
    pub fn relative_to(&self, origin: &PixelBounds) -> PixelBounds {
        PixelBounds::new(self.x - origin.x, self.y - origin.y, self.width, self.height)
    }
}
