//! Granule loading: read the part of one granule that falls inside the
//! output grid and bring it onto that grid.
//!
//! Sampling is nearest neighbour on pixel centres. An output pixel belongs
//! to a granule when its centre lies inside the granule footprint (left and
//! top edges inclusive), so granules that share an edge never both claim a
//! pixel.

use crate::decoder::{DecodeRequest, DecoderRegistry};
use crate::error::GranuleLoadError;
use crate::granule::Granule;
use crate::overview::ResolutionLevel;
use crate::raster::{AlphaMask, Raster};
use mosaic_common::{BoundingBox, GridToWorld, PixelBounds};
use mosaic_index::RecordId;
use std::sync::Arc;
use tracing::{debug, warn};

/// Read parameters shared by every granule of one request.
#[derive(Debug, Clone)]
pub struct LoadContext {
    /// Overview level to read from each granule.
    pub level: usize,
    /// Resolution of that level.
    pub level_resolution: ResolutionLevel,
    pub subsampling_x: u32,
    pub subsampling_y: u32,
    /// Output grid.
    pub grid_to_world: GridToWorld,
    /// Output pixel bounds in `grid_to_world` pixel space.
    pub bounds: PixelBounds,
    /// Pixels equal to this (all bands) become transparent.
    pub transparent_color: Option<Vec<f64>>,
    /// Decoder override from the request.
    pub decoder_hint: Option<String>,
    /// Mosaic-wide suggested decoder.
    pub suggested_decoder: Option<String>,
    pub decoders: Arc<DecoderRegistry>,
}

/// A granule's contribution, already on the output grid.
#[derive(Debug, Clone)]
pub struct LoadedTile {
    pub granule: RecordId,
    pub footprint: BoundingBox,
    /// Placement in output pixel space; `raster` has exactly this size.
    pub bounds: PixelBounds,
    /// Every output pixel the granule covers, before clipping to the
    /// request. Contains `bounds`.
    pub extent: PixelBounds,
    pub raster: Raster,
    /// Present when the source had a mask or a transparent color was set.
    pub alpha: Option<AlphaMask>,
}

/// Stateless loader; safe to run on any worker thread.
pub struct GranuleLoader;

impl GranuleLoader {
    /// Load a granule, converting any failure into `None`.
    pub fn load(granule: &Granule, ctx: &LoadContext) -> Option<LoadedTile> {
        match Self::try_load(granule, ctx) {
            Ok(tile) => tile,
            Err(e) => {
                warn!(
                    granule = %granule.id(),
                    location = granule.location(),
                    error = %e,
                    "Skipping granule"
                );
                None
            }
        }
    }

    /// Load a granule. `Ok(None)` means the granule covers no output pixel
    /// centre.
    pub fn try_load(
        granule: &Granule,
        ctx: &LoadContext,
    ) -> Result<Option<LoadedTile>, GranuleLoadError> {
        let location = granule.resolve()?;

        let extent = ctx.grid_to_world.centre_pixel_bounds(granule.footprint());
        let Some((extent, dest)) =
            extent.and_then(|extent| Some((extent, extent.intersection(&ctx.bounds)?)))
        else {
            debug!(granule = %granule.id(), "Granule covers no output pixel");
            return Ok(None);
        };

        let level_grid = granule_level_grid(granule.footprint(), ctx.level_resolution);
        let level_size = level_raster_size(granule.footprint(), ctx.level_resolution);

        // Level pixel sampled by every destination column / row.
        let cols: Vec<i64> = (dest.x..dest.max_x())
            .map(|c| source_index(ctx, &level_grid, c as f64 + 0.5, true, level_size.0))
            .collect::<Result<_, _>>()?;
        let rows: Vec<i64> = (dest.y..dest.max_y())
            .map(|r| source_index(ctx, &level_grid, r as f64 + 0.5, false, level_size.1))
            .collect::<Result<_, _>>()?;

        let (min_col, max_col) = min_max(&cols);
        let (min_row, max_row) = min_max(&rows);
        let region = PixelBounds::new(
            min_col,
            min_row,
            (max_col - min_col + 1) as usize,
            (max_row - min_row + 1) as usize,
        );

        let decoder = ctx
            .decoders
            .resolve(&[
                granule.decoder_hint(),
                ctx.decoder_hint.as_deref(),
                ctx.suggested_decoder.as_deref(),
            ])
            .ok_or_else(|| {
                GranuleLoadError::NoDecoder(
                    granule
                        .decoder_hint()
                        .unwrap_or_else(|| granule.location())
                        .to_string(),
                )
            })?;

        let request = DecodeRequest {
            location: location.to_path_buf(),
            level: ctx.level,
            region,
            subsampling_x: ctx.subsampling_x.max(1),
            subsampling_y: ctx.subsampling_y.max(1),
            format_hint: granule.decoder_hint().map(str::to_string),
        };
        let decoded = decoder.decode(&request)?;

        let (expected_width, expected_height) = request.output_size();
        if decoded.raster.width != expected_width || decoded.raster.height != expected_height {
            return Err(GranuleLoadError::UnexpectedSize {
                expected_width,
                expected_height,
                actual_width: decoded.raster.width,
                actual_height: decoded.raster.height,
            });
        }

        let sx = request.subsampling_x as i64;
        let sy = request.subsampling_y as i64;
        let decoded_col = |c: i64| (((c - region.x) / sx) as usize).min(expected_width - 1);
        let decoded_row = |r: i64| (((r - region.y) / sy) as usize).min(expected_height - 1);

        let bands = decoded.raster.bands();
        let mut data = Vec::with_capacity(dest.area() * bands);
        for &r in &rows {
            let dr = decoded_row(r);
            for &c in &cols {
                data.extend_from_slice(decoded.raster.pixel(decoded_col(c), dr));
            }
        }
        let raster = Raster::from_data(dest.width, dest.height, decoded.raster.layout.clone(), data)
            .ok_or_else(|| GranuleLoadError::UnexpectedSize {
                expected_width: dest.width,
                expected_height: dest.height,
                actual_width: 0,
                actual_height: 0,
            })?;

        let mut alpha = decoded.mask.as_ref().map(|mask| {
            let mut out = AlphaMask::opaque(dest.width, dest.height);
            for (j, &r) in rows.iter().enumerate() {
                let dr = decoded_row(r).min(mask.height.saturating_sub(1));
                for (i, &c) in cols.iter().enumerate() {
                    let dc = decoded_col(c).min(mask.width.saturating_sub(1));
                    out.set(i, j, mask.get(dc, dr));
                }
            }
            out
        });

        if let Some(color) = &ctx.transparent_color {
            let mask = alpha.get_or_insert_with(|| AlphaMask::opaque(dest.width, dest.height));
            apply_transparent_color(&raster, color, mask);
        }

        debug!(
            granule = %granule.id(),
            region = ?region,
            dest = ?dest,
            "Loaded granule"
        );

        Ok(Some(LoadedTile {
            granule: granule.id().clone(),
            footprint: *granule.footprint(),
            bounds: dest,
            extent,
            raster,
            alpha,
        }))
    }
}

/// Pixel grid of a granule at the chosen level, anchored at its upper-left
/// footprint corner.
fn granule_level_grid(footprint: &BoundingBox, res: ResolutionLevel) -> GridToWorld {
    GridToWorld::north_up(footprint.min_x, footprint.max_y, res.x, res.y)
}

fn level_raster_size(footprint: &BoundingBox, res: ResolutionLevel) -> (i64, i64) {
    let w = (footprint.width() / res.x).round().max(1.0) as i64;
    let h = (footprint.height() / res.y).round().max(1.0) as i64;
    (w, h)
}

/// Level pixel index under the centre of an output column (`is_col`) or row.
fn source_index(
    ctx: &LoadContext,
    level_grid: &GridToWorld,
    centre: f64,
    is_col: bool,
    limit: i64,
) -> Result<i64, GranuleLoadError> {
    // North-up grids: columns depend only on x, rows only on y, so any
    // coordinate on the other axis will do.
    let (wx, wy) = if is_col {
        ctx.grid_to_world.pixel_to_world(centre, 0.5)
    } else {
        ctx.grid_to_world.pixel_to_world(0.5, centre)
    };
    let (gx, gy) = level_grid
        .world_to_pixel(wx, wy)
        .ok_or_else(|| GranuleLoadError::Unresolvable {
            location: String::new(),
            reason: "singular granule grid".to_string(),
        })?;
    let v = if is_col { gx } else { gy };
    Ok((v.floor() as i64).clamp(0, limit - 1))
}

fn min_max(values: &[i64]) -> (i64, i64) {
    values
        .iter()
        .fold((i64::MAX, i64::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

fn apply_transparent_color(raster: &Raster, color: &[f64], mask: &mut AlphaMask) {
    let bands = raster.bands();
    if color.is_empty() {
        return;
    }
    for row in 0..raster.height {
        for col in 0..raster.width {
            let pixel = raster.pixel(col, row);
            let matches = (0..bands).all(|b| {
                let target = if color.len() == 1 {
                    color[0]
                } else {
                    color.get(b).copied().unwrap_or(f64::NAN)
                };
                pixel[b] == target
            });
            if matches {
                mask.set(col, row, 0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{DecodedRaster, GranuleDecoder};
    use crate::error::DecodeError;
    use crate::granule::PathResolver;
    use crate::raster::{PixelLayout, SampleType};
    use std::sync::Mutex;

    /// Serves a 10x10 level-0 raster with value col * 100 + row and records
    /// the requests it sees.
    struct Gradient {
        seen: Mutex<Vec<DecodeRequest>>,
    }

    impl GranuleDecoder for Gradient {
        fn format_id(&self) -> &str {
            "gradient"
        }

        fn decode(&self, request: &DecodeRequest) -> Result<DecodedRaster, DecodeError> {
            self.seen.lock().unwrap().push(request.clone());
            let (w, h) = request.output_size();
            let mut data = Vec::new();
            for j in 0..h {
                for i in 0..w {
                    let col = request.region.x + (i as i64) * request.subsampling_x as i64;
                    let row = request.region.y + (j as i64) * request.subsampling_y as i64;
                    data.push((col * 100 + row) as f64);
                }
            }
            Ok(DecodedRaster {
                raster: Raster::from_data(w, h, PixelLayout::component(SampleType::F32, 1), data)
                    .unwrap(),
                mask: None,
            })
        }
    }

    fn context(decoder: Arc<Gradient>, subsampling: u32, bounds: PixelBounds) -> LoadContext {
        LoadContext {
            level: 0,
            level_resolution: ResolutionLevel::square(1.0),
            subsampling_x: subsampling,
            subsampling_y: subsampling,
            grid_to_world: GridToWorld::north_up(0.0, 10.0, subsampling as f64, subsampling as f64),
            bounds,
            transparent_color: None,
            decoder_hint: None,
            suggested_decoder: None,
            decoders: Arc::new(DecoderRegistry::new().register(decoder)),
        }
    }

    fn granule(footprint: BoundingBox) -> Granule {
        Granule::new("g".into(), footprint, "g.raw", None, PathResolver::default()).unwrap()
    }

    #[test]
    fn test_aligned_crop_is_exact() {
        let decoder = Arc::new(Gradient { seen: Mutex::new(Vec::new()) });
        let ctx = context(decoder.clone(), 1, PixelBounds::new(2, 3, 4, 2));
        let g = granule(BoundingBox::new(0.0, 0.0, 10.0, 10.0));

        let tile = GranuleLoader::try_load(&g, &ctx).unwrap().unwrap();
        assert_eq!(tile.bounds, PixelBounds::new(2, 3, 4, 2));
        assert_eq!(tile.raster.get(0, 0, 0), 203.0);
        assert_eq!(tile.raster.get(3, 1, 0), 504.0);
        assert!(tile.alpha.is_none());

        let seen = decoder.seen.lock().unwrap();
        assert_eq!(seen[0].region, PixelBounds::new(2, 3, 4, 2));
    }

    #[test]
    fn test_subsampled_read() {
        let decoder = Arc::new(Gradient { seen: Mutex::new(Vec::new()) });
        // Output grid at 2x: 5x5 pixels cover the granule.
        let ctx = context(decoder.clone(), 2, PixelBounds::new(0, 0, 5, 5));
        let g = granule(BoundingBox::new(0.0, 0.0, 10.0, 10.0));

        let tile = GranuleLoader::try_load(&g, &ctx).unwrap().unwrap();
        assert_eq!((tile.raster.width, tile.raster.height), (5, 5));
        // Output pixel (1, 2) has its centre on level pixel (3, 5).
        assert_eq!(tile.raster.get(1, 2, 0), 305.0);
        assert_eq!(decoder.seen.lock().unwrap()[0].subsampling_x, 2);
    }

    #[test]
    fn test_partial_footprint_placement() {
        let decoder = Arc::new(Gradient { seen: Mutex::new(Vec::new()) });
        let ctx = context(decoder, 1, PixelBounds::new(0, 0, 20, 20));
        // Granule occupying world x 4..14, y 0..10 on a grid anchored at (0, 10).
        let g = granule(BoundingBox::new(4.0, 0.0, 14.0, 10.0));

        let tile = GranuleLoader::try_load(&g, &ctx).unwrap().unwrap();
        assert_eq!(tile.bounds, PixelBounds::new(4, 0, 10, 10));
        assert_eq!(tile.raster.get(0, 0, 0), 0.0);
        assert_eq!(tile.raster.get(9, 9, 0), 909.0);
    }

    #[test]
    fn test_transparent_color_builds_alpha() {
        let decoder = Arc::new(Gradient { seen: Mutex::new(Vec::new()) });
        let mut ctx = context(decoder, 1, PixelBounds::new(0, 0, 3, 3));
        ctx.transparent_color = Some(vec![101.0]);
        let g = granule(BoundingBox::new(0.0, 0.0, 10.0, 10.0));

        let tile = GranuleLoader::try_load(&g, &ctx).unwrap().unwrap();
        let alpha = tile.alpha.unwrap();
        assert_eq!(alpha.get(1, 1), 0);
        assert_eq!(alpha.get(0, 0), u8::MAX);
    }

    #[test]
    fn test_unresolvable_location_is_skipped() {
        let decoder = Arc::new(Gradient { seen: Mutex::new(Vec::new()) });
        let ctx = context(decoder, 1, PixelBounds::new(0, 0, 3, 3));
        let g = Granule::new(
            "g".into(),
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            "",
            None,
            PathResolver::default(),
        )
        .unwrap();

        assert!(GranuleLoader::try_load(&g, &ctx).is_err());
        assert!(GranuleLoader::load(&g, &ctx).is_none());
    }

    #[test]
    fn test_sliver_outside_pixel_centres() {
        let decoder = Arc::new(Gradient { seen: Mutex::new(Vec::new()) });
        let ctx = context(decoder, 1, PixelBounds::new(0, 0, 20, 20));
        let g = granule(BoundingBox::new(3.1, 0.0, 3.4, 10.0));
        assert!(GranuleLoader::try_load(&g, &ctx).unwrap().is_none());
    }
}
