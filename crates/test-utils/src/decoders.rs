//! Granule decoders for tests.
//!
//! [`MemoryDecoder`] serves rasters registered under a path, one per
//! overview level. [`AsciiGridDecoder`] reads a tiny whitespace separated
//! text format from disk so path resolution and I/O errors can be tested
//! end to end.

use crate::generators::decimate;
use mosaic_common::PixelBounds;
use mosaic_core::{
    AlphaMask, DecodeError, DecodeRequest, DecodedRaster, GranuleDecoder, PixelLayout, Raster,
    SampleType,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

enum Source {
    Levels(Vec<DecodedRaster>),
    Failing(String),
}

/// In-memory decoder keyed by granule path.
pub struct MemoryDecoder {
    format_id: String,
    sources: HashMap<PathBuf, Source>,
    decodes: AtomicUsize,
}

impl MemoryDecoder {
    pub fn new(format_id: &str) -> Self {
        Self {
            format_id: format_id.to_string(),
            sources: HashMap::new(),
            decodes: AtomicUsize::new(0),
        }
    }

    /// Single-level granule.
    pub fn with_granule(self, path: impl Into<PathBuf>, raster: Raster) -> Self {
        self.with_levels(path, vec![raster])
    }

    /// Single-level granule carrying its own validity mask.
    pub fn with_masked_granule(
        mut self,
        path: impl Into<PathBuf>,
        raster: Raster,
        mask: AlphaMask,
    ) -> Self {
        self.sources.insert(
            path.into(),
            Source::Levels(vec![DecodedRaster {
                raster,
                mask: Some(mask),
            }]),
        );
        self
    }

    /// Granule with explicit rasters per level, finest first.
    pub fn with_levels(mut self, path: impl Into<PathBuf>, levels: Vec<Raster>) -> Self {
        let levels = levels
            .into_iter()
            .map(|raster| DecodedRaster { raster, mask: None })
            .collect();
        self.sources.insert(path.into(), Source::Levels(levels));
        self
    }

    /// Granule whose overviews are decimations of `raster` by `factors`
    /// (the first factor should be 1).
    pub fn with_pyramid(self, path: impl Into<PathBuf>, raster: Raster, factors: &[usize]) -> Self {
        let levels = factors.iter().map(|&f| decimate(&raster, f)).collect();
        self.with_levels(path, levels)
    }

    /// Granule that always fails to decode.
    pub fn with_failure(mut self, path: impl Into<PathBuf>, reason: &str) -> Self {
        self.sources
            .insert(path.into(), Source::Failing(reason.to_string()));
        self
    }

    /// Number of decode calls so far, successful or not.
    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::Relaxed)
    }
}

impl GranuleDecoder for MemoryDecoder {
    fn format_id(&self) -> &str {
        &self.format_id
    }

    fn decode(&self, request: &DecodeRequest) -> Result<DecodedRaster, DecodeError> {
        self.decodes.fetch_add(1, Ordering::Relaxed);

        let location = request.location.display().to_string();
        let levels = match self.sources.get(&request.location) {
            Some(Source::Levels(levels)) => levels,
            Some(Source::Failing(reason)) => return Err(DecodeError::Corrupt(reason.clone())),
            None => return Err(DecodeError::NotFound(location)),
        };
        let source = levels.get(request.level).ok_or(DecodeError::MissingLevel {
            location,
            level: request.level,
        })?;

        let raster = read_region(&source.raster, request)?;
        let mask = source
            .mask
            .as_ref()
            .map(|mask| read_mask_region(mask, request));
        Ok(DecodedRaster { raster, mask })
    }
}

fn check_region(region: &PixelBounds, width: usize, height: usize) -> Result<(), DecodeError> {
    if region.is_empty()
        || region.x < 0
        || region.y < 0
        || region.max_x() > width as i64
        || region.max_y() > height as i64
    {
        return Err(DecodeError::RegionOutOfBounds {
            region: format!("{:?}", region),
            width,
            height,
        });
    }
    Ok(())
}

/// Crop and subsample the way a real decoder reading an overview does.
fn read_region(raster: &Raster, request: &DecodeRequest) -> Result<Raster, DecodeError> {
    let region = &request.region;
    check_region(region, raster.width, raster.height)?;

    let sx = request.subsampling_x.max(1) as usize;
    let sy = request.subsampling_y.max(1) as usize;
    if sx == 1 && sy == 1 {
        return raster.crop(region).ok_or_else(|| DecodeError::RegionOutOfBounds {
            region: format!("{:?}", region),
            width: raster.width,
            height: raster.height,
        });
    }

    let (width, height) = request.output_size();
    let mut data = Vec::with_capacity(width * height * raster.bands());
    for j in 0..height {
        let row = region.y as usize + j * sy;
        for i in 0..width {
            let col = region.x as usize + i * sx;
            data.extend_from_slice(raster.pixel(col, row));
        }
    }
    Ok(Raster {
        width,
        height,
        layout: raster.layout.clone(),
        data,
    })
}

fn read_mask_region(mask: &AlphaMask, request: &DecodeRequest) -> AlphaMask {
    let (width, height) = request.output_size();
    let sx = request.subsampling_x.max(1) as usize;
    let sy = request.subsampling_y.max(1) as usize;
    let mut out = AlphaMask::opaque(width, height);
    for j in 0..height {
        for i in 0..width {
            let col = (request.region.x as usize + i * sx).min(mask.width - 1);
            let row = (request.region.y as usize + j * sy).min(mask.height - 1);
            out.set(i, j, mask.get(col, row));
        }
    }
    out
}

/// Reads single-band `F64` granules from text files.
///
/// File layout: a `width height` header line, then `height` lines of
/// `width` whitespace separated numbers. Only level 0 exists.
#[derive(Debug, Default)]
pub struct AsciiGridDecoder;

impl AsciiGridDecoder {
    pub const FORMAT_ID: &'static str = "ascii-grid";
}

impl GranuleDecoder for AsciiGridDecoder {
    fn format_id(&self) -> &str {
        Self::FORMAT_ID
    }

    fn decode(&self, request: &DecodeRequest) -> Result<DecodedRaster, DecodeError> {
        if request.level != 0 {
            return Err(DecodeError::MissingLevel {
                location: request.location.display().to_string(),
                level: request.level,
            });
        }
        let raster = read_ascii_grid(&request.location)?;
        let raster = read_region(&raster, request)?;
        Ok(DecodedRaster { raster, mask: None })
    }
}

/// Parse a whole ASCII grid file.
pub fn read_ascii_grid(path: &Path) -> Result<Raster, DecodeError> {
    let text = std::fs::read_to_string(path)?;
    let mut tokens = text.split_whitespace();

    let mut next_dim = |name: &str| -> Result<usize, DecodeError> {
        tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| DecodeError::Corrupt(format!("missing or invalid {}", name)))
    };
    let width = next_dim("width")?;
    let height = next_dim("height")?;

    let data = tokens
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| DecodeError::Corrupt(format!("invalid sample '{}'", t)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Raster::from_data(width, height, PixelLayout::component(SampleType::F64, 1), data)
        .ok_or_else(|| DecodeError::Corrupt(format!("expected {} samples", width * height)))
}

/// Write the first band of `raster` as an ASCII grid file.
pub fn write_ascii_grid(path: &Path, raster: &Raster) -> std::io::Result<()> {
    let mut out = format!("{} {}\n", raster.width, raster.height);
    for row in 0..raster.height {
        let line: Vec<String> = (0..raster.width)
            .map(|col| raster.get(col, row, 0).to_string())
            .collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    std::fs::write(path, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::gradient_raster;

    fn request(path: &str, level: usize, region: PixelBounds, ss: u32) -> DecodeRequest {
        DecodeRequest {
            location: PathBuf::from(path),
            level,
            region,
            subsampling_x: ss,
            subsampling_y: ss,
            format_hint: None,
        }
    }

    #[test]
    fn test_memory_decoder_crop_and_subsample() {
        let decoder = MemoryDecoder::new("mem").with_granule("/g/a", gradient_raster(6, 6, 0));

        let out = decoder
            .decode(&request("/g/a", 0, PixelBounds::new(1, 1, 5, 5), 2))
            .unwrap();
        assert_eq!((out.raster.width, out.raster.height), (3, 3));
        assert_eq!(out.raster.get(0, 0, 0), 1001.0);
        assert_eq!(out.raster.get(2, 1, 0), 3005.0);
        assert_eq!(decoder.decode_count(), 1);
    }

    #[test]
    fn test_memory_decoder_errors() {
        let decoder = MemoryDecoder::new("mem")
            .with_granule("/g/a", gradient_raster(4, 4, 0))
            .with_failure("/g/bad", "truncated");

        let region = PixelBounds::new(0, 0, 2, 2);
        assert!(matches!(
            decoder.decode(&request("/g/missing", 0, region, 1)),
            Err(DecodeError::NotFound(_))
        ));
        assert!(matches!(
            decoder.decode(&request("/g/bad", 0, region, 1)),
            Err(DecodeError::Corrupt(_))
        ));
        assert!(matches!(
            decoder.decode(&request("/g/a", 1, region, 1)),
            Err(DecodeError::MissingLevel { level: 1, .. })
        ));
        assert!(matches!(
            decoder.decode(&request("/g/a", 0, PixelBounds::new(3, 3, 2, 2), 1)),
            Err(DecodeError::RegionOutOfBounds { .. })
        ));
        assert_eq!(decoder.decode_count(), 4);
    }

    #[test]
    fn test_ascii_grid_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.txt");
        write_ascii_grid(&path, &gradient_raster(3, 2, 7)).unwrap();

        let out = AsciiGridDecoder
            .decode(&DecodeRequest {
                location: path,
                level: 0,
                region: PixelBounds::new(1, 0, 2, 2),
                subsampling_x: 1,
                subsampling_y: 1,
                format_hint: None,
            })
            .unwrap();
        assert_eq!(out.raster.layout.sample_type, SampleType::F64);
        assert_eq!(out.raster.data, vec![8.0, 9.0, 1008.0, 1009.0]);
    }

    #[test]
    fn test_ascii_grid_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_ascii_grid(&dir.path().join("nope.txt"));
        assert!(matches!(result, Err(DecodeError::Io(_))));
    }
}
