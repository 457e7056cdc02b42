//! Granule decoders and the format dispatch table.
//!
//! Pixel decoding is delegated to implementations of [`GranuleDecoder`].
//! The registry is filled once when a mosaic is opened and never changes
//! afterwards, so lookups need no locking.

use crate::error::DecodeError;
use crate::raster::{AlphaMask, Raster};
use mosaic_common::PixelBounds;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// What to read from a granule.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeRequest {
    pub location: PathBuf,
    /// Overview level of the granule to read.
    pub level: usize,
    /// Region in the level's pixel space, fully inside the level raster.
    pub region: PixelBounds,
    /// Keep every n-th column / row of `region`, starting with its first.
    pub subsampling_x: u32,
    pub subsampling_y: u32,
    pub format_hint: Option<String>,
}

impl DecodeRequest {
    /// Size of the raster a decoder must return.
    pub fn output_size(&self) -> (usize, usize) {
        let sx = self.subsampling_x.max(1) as usize;
        let sy = self.subsampling_y.max(1) as usize;
        (self.region.width.div_ceil(sx), self.region.height.div_ceil(sy))
    }
}

/// Decoded pixels plus the source's own validity mask, if it has one.
#[derive(Debug, Clone)]
pub struct DecodedRaster {
    pub raster: Raster,
    pub mask: Option<AlphaMask>,
}

/// Reads pixels out of one granule format.
///
/// Implementations are called from worker threads and may block.
pub trait GranuleDecoder: Send + Sync {
    /// Identifier used for dispatch (e.g. `"geotiff"`).
    fn format_id(&self) -> &str;

    fn decode(&self, request: &DecodeRequest) -> Result<DecodedRaster, DecodeError>;
}

/// Format id to decoder lookup.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn GranuleDecoder>>,
    default_format: Option<String>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder under its format id. The first registered decoder
    /// becomes the default.
    pub fn register(mut self, decoder: Arc<dyn GranuleDecoder>) -> Self {
        let id = decoder.format_id().to_string();
        if self.default_format.is_none() {
            self.default_format = Some(id.clone());
        }
        self.decoders.insert(id, decoder);
        self
    }

    pub fn with_default(mut self, format_id: &str) -> Self {
        self.default_format = Some(format_id.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    pub fn get(&self, format_id: &str) -> Option<&Arc<dyn GranuleDecoder>> {
        self.decoders.get(format_id)
    }

    /// First registered decoder among `hints` (most specific first), falling
    /// back to the default decoder.
    pub fn resolve(&self, hints: &[Option<&str>]) -> Option<Arc<dyn GranuleDecoder>> {
        hints
            .iter()
            .flatten()
            .find_map(|hint| self.decoders.get(*hint))
            .or_else(|| {
                self.default_format
                    .as_deref()
                    .and_then(|id| self.decoders.get(id))
            })
            .cloned()
    }

    pub fn formats(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("formats", &self.formats())
            .field("default_format", &self.default_format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{PixelLayout, SampleType};

    struct Named(&'static str);

    impl GranuleDecoder for Named {
        fn format_id(&self) -> &str {
            self.0
        }

        fn decode(&self, request: &DecodeRequest) -> Result<DecodedRaster, DecodeError> {
            let (w, h) = request.output_size();
            Ok(DecodedRaster {
                raster: Raster::filled(w, h, PixelLayout::component(SampleType::U8, 1), &[1.0]),
                mask: None,
            })
        }
    }

    #[test]
    fn test_dispatch_order() {
        let registry = DecoderRegistry::new()
            .register(Arc::new(Named("geotiff")))
            .register(Arc::new(Named("png")));

        let pick = |hints: &[Option<&str>]| {
            registry
                .resolve(hints)
                .map(|d| d.format_id().to_string())
        };

        assert_eq!(pick(&[Some("png"), Some("geotiff")]).as_deref(), Some("png"));
        assert_eq!(pick(&[None, Some("png")]).as_deref(), Some("png"));
        assert_eq!(pick(&[Some("jpeg")]).as_deref(), Some("geotiff"));
        assert_eq!(pick(&[]).as_deref(), Some("geotiff"));
        assert!(DecoderRegistry::new().resolve(&[Some("png")]).is_none());

        let registry = registry.with_default("png");
        assert_eq!(
            registry.resolve(&[Some("jpeg")]).map(|d| d.format_id().to_string()).as_deref(),
            Some("png")
        );
    }

    #[test]
    fn test_output_size_rounds_up() {
        let request = DecodeRequest {
            location: PathBuf::from("a"),
            level: 0,
            region: PixelBounds::new(0, 0, 5, 4),
            subsampling_x: 2,
            subsampling_y: 3,
            format_hint: None,
        };
        assert_eq!(request.output_size(), (3, 2));
    }
}
