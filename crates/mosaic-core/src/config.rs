//! Configuration for a mosaic reader.
//!
//! `MosaicConfig` is a plain serde record. Parsing it out of a file is left
//! to the caller; any serde format works.

use crate::executor::ExecutorConfig;
use crate::granule::{PathMode, PathResolver};
use crate::overview::{OverviewPolicy, ResolutionLevel};
use crate::raster::{PixelLayout, SampleType};
use mosaic_common::{BoundingBox, CrsCode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for one mosaic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicConfig {
    /// Name used in logs.
    pub name: String,

    /// Resolution of each overview level, native first.
    pub levels: Vec<ResolutionLevel>,

    /// Index attribute holding the granule location.
    pub location_attribute: String,

    /// Index attribute holding a per-granule decoder hint.
    pub decoder_attribute: Option<String>,

    /// Index attribute holding the granule time, if the mosaic is time-aware.
    pub time_attribute: Option<String>,

    /// Index attribute holding the granule elevation.
    pub elevation_attribute: Option<String>,

    /// Decoder to prefer when a granule carries no hint.
    pub suggested_decoder: Option<String>,

    /// How granule locations are interpreted.
    pub path_mode: PathMode,

    /// Root directory for relative locations.
    pub root: Option<PathBuf>,

    /// Mosaic extent. Taken from the index when absent.
    pub envelope: Option<BoundingBox>,

    pub crs: CrsCode,

    /// Overview policy for requests that don't choose one.
    pub overview_policy: OverviewPolicy,

    /// Background values for requests that don't set any.
    pub background: Option<Vec<f64>>,

    /// Granule count above which a request is refused.
    pub max_granules: usize,

    /// Output pixel count (width x height) above which a request is refused.
    pub max_output_pixels: usize,

    /// Number of granules kept in the granule cache.
    pub granule_cache_size: usize,

    pub executor: ExecutorConfig,

    /// Layout of responses where no granule loaded.
    pub default_layout: OutputLayout,
}

/// Sample type and band count of an empty response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLayout {
    pub sample_type: SampleType,
    pub bands: usize,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            sample_type: SampleType::F32,
            bands: 1,
        }
    }
}

impl From<OutputLayout> for PixelLayout {
    fn from(layout: OutputLayout) -> Self {
        PixelLayout::component(layout.sample_type, layout.bands)
    }
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            name: "mosaic".to_string(),
            levels: vec![ResolutionLevel::square(1.0)],
            location_attribute: "location".to_string(),
            decoder_attribute: None,
            time_attribute: None,
            elevation_attribute: None,
            suggested_decoder: None,
            path_mode: PathMode::Relative,
            root: None,
            envelope: None,
            crs: CrsCode::default(),
            overview_policy: OverviewPolicy::default(),
            background: None,
            max_granules: 1000,
            max_output_pixels: 1 << 26,
            granule_cache_size: 4096,
            executor: ExecutorConfig::default(),
            default_layout: OutputLayout::default(),
        }
    }
}

impl MosaicConfig {
    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply operational overrides from environment variables.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("MOSAIC_MAX_GRANULES") {
            if let Ok(max) = val.parse() {
                self.max_granules = max;
            }
        }

        if let Ok(val) = std::env::var("MOSAIC_MAX_OUTPUT_PIXELS") {
            if let Ok(max) = val.parse() {
                self.max_output_pixels = max;
            }
        }

        if let Ok(val) = std::env::var("MOSAIC_POOLING") {
            self.executor.pooling = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("MOSAIC_WORKERS") {
            if let Ok(workers) = val.parse() {
                self.executor.workers = workers;
            }
        }

        if let Ok(val) = std::env::var("MOSAIC_GRANULE_CACHE_SIZE") {
            if let Ok(size) = val.parse() {
                self.granule_cache_size = size;
            }
        }

        if let Ok(val) = std::env::var("MOSAIC_OVERVIEW_POLICY") {
            self.overview_policy = OverviewPolicy::from_str(&val);
        }

        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.levels.is_empty() {
            return Err("at least one resolution level is required".to_string());
        }

        for (i, level) in self.levels.iter().enumerate() {
            if !level.is_valid() {
                return Err(format!("resolution level {} is not positive: {:?}", i, level));
            }
        }

        for (i, pair) in self.levels.windows(2).enumerate() {
            if pair[1].x < pair[0].x || pair[1].y < pair[0].y {
                return Err(format!(
                    "resolution level {} is finer than level {}",
                    i + 1,
                    i
                ));
            }
        }

        if self.location_attribute.trim().is_empty() {
            return Err("location_attribute must not be empty".to_string());
        }

        if let Some(envelope) = &self.envelope {
            if !envelope.is_valid() || envelope.is_empty() {
                return Err(format!("envelope {} is empty or invalid", envelope));
            }
        }

        if let Some(background) = &self.background {
            if background.is_empty() {
                return Err("background must have at least one value".to_string());
            }
        }

        if self.max_granules == 0 {
            return Err("max_granules must be > 0".to_string());
        }

        if self.max_output_pixels == 0 {
            return Err("max_output_pixels must be > 0".to_string());
        }

        if self.granule_cache_size == 0 {
            return Err("granule_cache_size must be > 0".to_string());
        }

        if self.executor.pooling && self.executor.workers == 0 {
            return Err("executor.workers must be > 0 when pooling".to_string());
        }

        if self.default_layout.bands == 0 {
            return Err("default_layout.bands must be > 0".to_string());
        }

        Ok(())
    }

    pub fn path_resolver(&self) -> PathResolver {
        PathResolver::new(self.path_mode, self.root.clone())
    }
}
