//! Granules: the source rasters a mosaic is made of.

use crate::error::GranuleLoadError;
use mosaic_common::BoundingBox;
use mosaic_index::{IndexRecord, RecordId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// How granule locations stored in the index are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathMode {
    /// Locations must already be absolute paths.
    Absolute,
    /// Locations are relative to the mosaic root directory.
    Relative,
}

impl Default for PathMode {
    fn default() -> Self {
        Self::Relative
    }
}

/// Turns a stored location into a path for the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathResolver {
    pub mode: PathMode,
    pub root: Option<PathBuf>,
}

impl PathResolver {
    pub fn new(mode: PathMode, root: Option<PathBuf>) -> Self {
        Self { mode, root }
    }

    pub fn resolve(&self, location: &str) -> Result<PathBuf, GranuleLoadError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(GranuleLoadError::Unresolvable {
                location: location.to_string(),
                reason: "empty location".to_string(),
            });
        }

        let path = Path::new(location);
        match self.mode {
            PathMode::Absolute if path.is_absolute() => Ok(path.to_path_buf()),
            PathMode::Absolute => Err(GranuleLoadError::Unresolvable {
                location: location.to_string(),
                reason: "absolute path required".to_string(),
            }),
            PathMode::Relative => match &self.root {
                Some(root) if !path.is_absolute() => Ok(root.join(path)),
                _ => Ok(path.to_path_buf()),
            },
        }
    }
}

/// One source raster.
///
/// Immutable once built; the resolved path is computed on first use and
/// remembered, including a failed resolution.
#[derive(Debug)]
pub struct Granule {
    id: RecordId,
    footprint: BoundingBox,
    location: String,
    decoder_hint: Option<String>,
    resolver: PathResolver,
    resolved: OnceLock<Result<PathBuf, String>>,
}

impl Granule {
    pub fn new(
        id: RecordId,
        footprint: BoundingBox,
        location: impl Into<String>,
        decoder_hint: Option<String>,
        resolver: PathResolver,
    ) -> Result<Self, GranuleLoadError> {
        if !footprint.is_valid() || footprint.is_empty() {
            return Err(GranuleLoadError::InvalidFootprint(id.to_string()));
        }
        Ok(Self {
            id,
            footprint,
            location: location.into(),
            decoder_hint,
            resolver,
            resolved: OnceLock::new(),
        })
    }

    /// Build from an index record using the configured attribute names.
    pub fn from_record(
        record: &IndexRecord,
        location_attribute: &str,
        decoder_attribute: Option<&str>,
        resolver: PathResolver,
    ) -> Result<Self, GranuleLoadError> {
        let location = record
            .text(location_attribute)
            .ok_or_else(|| GranuleLoadError::MissingLocation(record.id.to_string()))?;
        let hint = decoder_attribute
            .and_then(|attr| record.text(attr))
            .map(str::to_string);
        Self::new(record.id.clone(), record.footprint, location, hint, resolver)
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn footprint(&self) -> &BoundingBox {
        &self.footprint
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn decoder_hint(&self) -> Option<&str> {
        self.decoder_hint.as_deref()
    }

    /// Path handed to the decoder.
    pub fn resolve(&self) -> Result<&Path, GranuleLoadError> {
        let resolved = self.resolved.get_or_init(|| {
            self.resolver
                .resolve(&self.location)
                .map_err(|e| e.to_string())
        });
        match resolved {
            Ok(path) => Ok(path.as_path()),
            Err(reason) => Err(GranuleLoadError::Unresolvable {
                location: self.location.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn footprint() -> BoundingBox {
        BoundingBox::new(0.0, 0.0, 10.0, 10.0)
    }

    #[test]
    fn test_relative_joins_root() {
        let resolver = PathResolver::new(PathMode::Relative, Some(PathBuf::from("/data/mosaic")));
        let g = Granule::new("g".into(), footprint(), "tiles/a.tif", None, resolver).unwrap();
        assert_eq!(g.resolve().unwrap(), Path::new("/data/mosaic/tiles/a.tif"));
    }

    #[test]
    fn test_absolute_mode_rejects_relative() {
        let resolver = PathResolver::new(PathMode::Absolute, None);
        let g = Granule::new("g".into(), footprint(), "tiles/a.tif", None, resolver).unwrap();
        assert!(matches!(
            g.resolve(),
            Err(GranuleLoadError::Unresolvable { .. })
        ));
        // Second call hits the remembered failure.
        assert!(g.resolve().is_err());
    }

    #[test]
    fn test_empty_footprint_rejected() {
        let line = BoundingBox::new(0.0, 0.0, 0.0, 10.0);
        let result = Granule::new("g".into(), line, "a.tif", None, PathResolver::default());
        assert!(matches!(result, Err(GranuleLoadError::InvalidFootprint(_))));
    }

    #[test]
    fn test_from_record_requires_location() {
        let record = IndexRecord::new("g9", footprint()).with_attribute("path", "a.tif");
        let result = Granule::from_record(&record, "location", None, PathResolver::default());
        assert!(matches!(result, Err(GranuleLoadError::MissingLocation(ref id)) if id == "g9"));

        let record = record
            .with_attribute("location", "b.tif")
            .with_attribute("format", "memory");
        let g = Granule::from_record(&record, "location", Some("format"), PathResolver::default())
            .unwrap();
        assert_eq!(g.location(), "b.tif");
        assert_eq!(g.decoder_hint(), Some("memory"));
    }
}
