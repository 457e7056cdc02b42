//! Bringing tiles onto one pixel layout before compositing.

use super::CompositeMode;
use crate::loader::LoadedTile;
use crate::raster::{ColorModel, PixelLayout, Raster, SampleType};
use tracing::warn;

/// Layout of the composite: the first tile's, unless index-color tiles
/// cannot share it (palettes differ, mixed models, or blending indices),
/// in which case palettes are expanded to 8-bit RGBA.
pub(crate) fn target_layout(tiles: &[LoadedTile], mode: CompositeMode) -> Option<PixelLayout> {
    let first = &tiles.first()?.raster.layout;
    if !first.is_indexed() {
        return Some(first.clone());
    }

    let shared_palette = tiles.iter().all(|t| t.raster.layout == *first);
    if shared_palette && mode == CompositeMode::Overlay {
        Some(first.clone())
    } else {
        Some(PixelLayout::component(SampleType::U8, 4))
    }
}

/// Convert a tile to `target`. Tiles whose band structure cannot be mapped
/// are dropped.
pub(crate) fn conform(mut tile: LoadedTile, target: &PixelLayout) -> Option<LoadedTile> {
    if tile.raster.layout == *target {
        return Some(tile);
    }

    if tile.raster.layout.is_indexed() {
        tile.raster = expand_palette(&tile.raster);
    }

    let Some(mut raster) = adapt_bands(&tile.raster, target.bands) else {
        warn!(
            granule = %tile.granule,
            bands = tile.raster.bands(),
            target_bands = target.bands,
            "Dropping tile with incompatible band layout"
        );
        return None;
    };

    if raster.layout.sample_type != target.sample_type {
        for v in raster.data.iter_mut() {
            *v = target.sample_type.conform(*v);
        }
    }
    raster.layout = target.clone();
    tile.raster = raster;
    Some(tile)
}

/// Index-color raster to 8-bit RGBA through its palette.
pub fn expand_palette(raster: &Raster) -> Raster {
    let ColorModel::Indexed(palette) = &raster.layout.color_model else {
        return raster.clone();
    };

    let mut data = Vec::with_capacity(raster.width * raster.height * 4);
    for row in 0..raster.height {
        for col in 0..raster.width {
            let rgba = palette.lookup(raster.get(col, row, 0));
            data.extend(rgba.iter().map(|&c| c as f64));
        }
    }
    Raster {
        width: raster.width,
        height: raster.height,
        layout: PixelLayout::component(SampleType::U8, 4),
        data,
    }
}

/// Map between gray, gray+alpha, RGB and RGBA band structures.
fn adapt_bands(raster: &Raster, target_bands: usize) -> Option<Raster> {
    let source_bands = raster.bands();
    if source_bands == target_bands {
        return Some(raster.clone());
    }

    let opaque = raster.layout.sample_type.range().1;
    let convert: fn(&[f64], f64) -> Vec<f64> = match (source_bands, target_bands) {
        (1, 2) => |p, a| vec![p[0], a],
        (1, 3) => |p, _| vec![p[0], p[0], p[0]],
        (1, 4) => |p, a| vec![p[0], p[0], p[0], a],
        (2, 1) => |p, _| vec![p[0]],
        (2, 4) => |p, _| vec![p[0], p[0], p[0], p[1]],
        (3, 1) => |p, _| vec![(p[0] + p[1] + p[2]) / 3.0],
        (3, 4) => |p, a| vec![p[0], p[1], p[2], a],
        (4, 1) => |p, _| vec![(p[0] + p[1] + p[2]) / 3.0],
        (4, 2) => |p, _| vec![(p[0] + p[1] + p[2]) / 3.0, p[3]],
        (4, 3) => |p, _| vec![p[0], p[1], p[2]],
        _ => return None,
    };

    let mut data = Vec::with_capacity(raster.width * raster.height * target_bands);
    for row in 0..raster.height {
        for col in 0..raster.width {
            data.extend(convert(raster.pixel(col, row), opaque));
        }
    }
    Some(Raster {
        width: raster.width,
        height: raster.height,
        layout: PixelLayout::component(raster.layout.sample_type, target_bands),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Palette;
    use mosaic_common::{BoundingBox, PixelBounds};
    use std::sync::Arc;

    fn indexed_tile(palette: Arc<Palette>, index: f64) -> LoadedTile {
        let layout = PixelLayout {
            sample_type: SampleType::U8,
            bands: 1,
            color_model: ColorModel::Indexed(palette),
        };
        LoadedTile {
            granule: "t".into(),
            footprint: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            bounds: PixelBounds::new(0, 0, 1, 1),
            extent: PixelBounds::new(0, 0, 1, 1),
            raster: Raster::filled(1, 1, layout, &[index]),
            alpha: None,
        }
    }

    #[test]
    fn test_same_palette_kept() {
        let palette = Arc::new(Palette::new(vec![[0, 0, 0, 255], [255, 0, 0, 255]]));
        let tiles = vec![
            indexed_tile(palette.clone(), 0.0),
            indexed_tile(palette.clone(), 1.0),
        ];
        let target = target_layout(&tiles, CompositeMode::Overlay).unwrap();
        assert!(target.is_indexed());
    }

    #[test]
    fn test_different_palettes_expand() {
        let red = Arc::new(Palette::new(vec![[255, 0, 0, 255]]));
        let blue = Arc::new(Palette::new(vec![[0, 0, 255, 255]]));
        let tiles = vec![indexed_tile(red, 0.0), indexed_tile(blue, 0.0)];

        let target = target_layout(&tiles, CompositeMode::Overlay).unwrap();
        assert_eq!(target, PixelLayout::component(SampleType::U8, 4));

        let conformed: Vec<_> = tiles
            .into_iter()
            .filter_map(|t| conform(t, &target))
            .collect();
        assert_eq!(conformed[0].raster.pixel(0, 0), &[255.0, 0.0, 0.0, 255.0]);
        assert_eq!(conformed[1].raster.pixel(0, 0), &[0.0, 0.0, 255.0, 255.0]);
    }

    #[test]
    fn test_gray_into_rgb() {
        let gray = Raster::filled(1, 1, PixelLayout::component(SampleType::U8, 1), &[7.0]);
        let rgba = adapt_bands(&gray, 4).unwrap();
        assert_eq!(rgba.pixel(0, 0), &[7.0, 7.0, 7.0, 255.0]);
        assert!(adapt_bands(&gray, 5).is_none());
    }
}
