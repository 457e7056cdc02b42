//! Common mosaic fixtures.
//!
//! [`MosaicFixture`] lays out a regular grid of granules, optionally
//! repeated per time step and elevation, and produces the matching index,
//! decoder and configuration. Every granule holds a [`gradient_raster`]
//! with its own offset, so any output sample identifies its source.

use crate::decoders::MemoryDecoder;
use crate::generators::gradient_raster;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mosaic_common::BoundingBox;
use mosaic_core::{
    DecoderRegistry, GranuleExecutor, MosaicConfig, OutputLayout, RasterManager, ResolutionLevel,
    SampleType,
};
use mosaic_index::{
    AttributeValue, Filter, GranuleIndex, IndexError, IndexQuery, IndexRecord, MemoryIndex,
    RecordId,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Format id of the fixture decoder.
pub const FIXTURE_FORMAT: &str = "memory";

/// Root directory granule locations are resolved against.
pub const FIXTURE_ROOT: &str = "/mosaic";

/// Index whose queries always fail. `bounds` still answers so a mosaic can
/// be opened on top of it.
pub struct FailingIndex {
    bounds: BoundingBox,
}

impl FailingIndex {
    pub fn new(bounds: BoundingBox) -> Self {
        Self { bounds }
    }
}

#[async_trait]
impl GranuleIndex for FailingIndex {
    async fn query(&self, _query: &IndexQuery) -> mosaic_index::Result<Vec<IndexRecord>> {
        Err(IndexError::Unavailable("connection refused".to_string()))
    }

    async fn aggregate_max(
        &self,
        _attribute: &str,
        _filter: &Filter,
    ) -> mosaic_index::Result<Option<(AttributeValue, RecordId)>> {
        Err(IndexError::Unavailable("connection refused".to_string()))
    }

    fn supports_sorting(&self) -> bool {
        true
    }

    async fn bounds(&self) -> mosaic_index::Result<Option<BoundingBox>> {
        Ok(Some(self.bounds))
    }

    async fn distinct_values(&self, _attribute: &str) -> mosaic_index::Result<Vec<AttributeValue>> {
        Err(IndexError::Unavailable("connection refused".to_string()))
    }
}

/// A regular grid of granules.
///
/// Granule `(col, row)` covers `granule_size` pixels per side at the native
/// resolution; row 0 is the northernmost row and the envelope's lower-left
/// corner sits at the origin.
#[derive(Debug, Clone)]
pub struct MosaicFixture {
    pub cols: usize,
    pub rows: usize,
    pub granule_size: usize,
    pub resolution: f64,
    /// Decimation factor of each overview level, finest first.
    pub overview_factors: Vec<usize>,
    pub times: Vec<DateTime<Utc>>,
    pub elevations: Vec<f64>,
    pub sorting: bool,
}

impl MosaicFixture {
    pub fn grid(cols: usize, rows: usize, granule_size: usize) -> Self {
        Self {
            cols,
            rows,
            granule_size,
            resolution: 1.0,
            overview_factors: vec![1],
            times: Vec::new(),
            elevations: Vec::new(),
            sorting: true,
        }
    }

    pub fn with_overviews(mut self, factors: &[usize]) -> Self {
        self.overview_factors = factors.to_vec();
        self
    }

    pub fn with_times(mut self, times: Vec<DateTime<Utc>>) -> Self {
        self.times = times;
        self
    }

    pub fn with_elevations(mut self, elevations: Vec<f64>) -> Self {
        self.elevations = elevations;
        self
    }

    /// Back the mosaic with an index that cannot sort.
    pub fn without_sorting(mut self) -> Self {
        self.sorting = false;
        self
    }

    fn granule_extent(&self) -> f64 {
        self.granule_size as f64 * self.resolution
    }

    pub fn envelope(&self) -> BoundingBox {
        let extent = self.granule_extent();
        BoundingBox::new(
            0.0,
            0.0,
            self.cols as f64 * extent,
            self.rows as f64 * extent,
        )
    }

    pub fn footprint(&self, col: usize, row: usize) -> BoundingBox {
        let extent = self.granule_extent();
        let max_y = (self.rows - row) as f64 * extent;
        BoundingBox::new(
            col as f64 * extent,
            max_y - extent,
            (col + 1) as f64 * extent,
            max_y,
        )
    }

    fn time_steps(&self) -> usize {
        self.times.len().max(1)
    }

    fn elevation_steps(&self) -> usize {
        self.elevations.len().max(1)
    }

    /// Value of native pixel (0, 0) of a granule. Pixel `(c, r)` holds
    /// `offset + r * 1000 + c`.
    pub fn offset(&self, time: usize, elevation: usize, col: usize, row: usize) -> i32 {
        let granule = row * self.cols + col;
        let slot = (time * self.elevation_steps() + elevation) * self.cols * self.rows + granule;
        (slot * 100_000) as i32
    }

    /// Location attribute of a granule, relative to [`FIXTURE_ROOT`].
    pub fn location(&self, time: usize, elevation: usize, col: usize, row: usize) -> String {
        format!("t{}/e{}/g-{}-{}.tif", time, elevation, row, col)
    }

    pub fn path(&self, time: usize, elevation: usize, col: usize, row: usize) -> PathBuf {
        PathBuf::from(FIXTURE_ROOT).join(self.location(time, elevation, col, row))
    }

    fn slots(&self) -> Vec<(usize, usize, usize, usize)> {
        let mut slots = Vec::new();
        for t in 0..self.time_steps() {
            for e in 0..self.elevation_steps() {
                for row in 0..self.rows {
                    for col in 0..self.cols {
                        slots.push((t, e, col, row));
                    }
                }
            }
        }
        slots
    }

    /// One record per granule, ordered by time, elevation, row, column.
    pub fn records(&self) -> Vec<IndexRecord> {
        self.slots()
            .into_iter()
            .map(|(t, e, col, row)| {
                let id = format!("t{}-e{}-g{}-{}", t, e, row, col);
                let mut record = IndexRecord::new(id.as_str(), self.footprint(col, row))
                    .with_attribute("location", self.location(t, e, col, row));
                if let Some(time) = self.times.get(t) {
                    record = record.with_attribute("time", *time);
                }
                if let Some(elevation) = self.elevations.get(e) {
                    record = record.with_attribute("elevation", *elevation);
                }
                record
            })
            .collect()
    }

    pub fn index(&self) -> MemoryIndex {
        let index = MemoryIndex::from_records(self.records());
        if self.sorting {
            index
        } else {
            index.without_sorting()
        }
    }

    /// Decoder serving every granule with the configured overviews.
    pub fn decoder(&self) -> MemoryDecoder {
        self.slots()
            .into_iter()
            .fold(MemoryDecoder::new(FIXTURE_FORMAT), |decoder, (t, e, col, row)| {
                let raster = gradient_raster(
                    self.granule_size,
                    self.granule_size,
                    self.offset(t, e, col, row),
                );
                decoder.with_pyramid(self.path(t, e, col, row), raster, &self.overview_factors)
            })
    }

    pub fn config(&self) -> MosaicConfig {
        MosaicConfig {
            name: "fixture".to_string(),
            levels: self
                .overview_factors
                .iter()
                .map(|&f| ResolutionLevel::square(self.resolution * f as f64))
                .collect(),
            time_attribute: (!self.times.is_empty()).then(|| "time".to_string()),
            elevation_attribute: (!self.elevations.is_empty()).then(|| "elevation".to_string()),
            root: Some(PathBuf::from(FIXTURE_ROOT)),
            default_layout: OutputLayout {
                sample_type: SampleType::I32,
                bands: 1,
            },
            ..MosaicConfig::default()
        }
    }

    /// Open a mosaic over this fixture with the default executor.
    pub async fn open(&self) -> RasterManager {
        self.open_with(self.config(), Arc::new(self.decoder()), None)
            .await
    }

    /// Open with a custom config, a shared decoder (to inspect its decode
    /// count) and an optional executor.
    pub async fn open_with(
        &self,
        config: MosaicConfig,
        decoder: Arc<MemoryDecoder>,
        executor: Option<Arc<GranuleExecutor>>,
    ) -> RasterManager {
        let decoders = DecoderRegistry::new().register(decoder);
        RasterManager::open(config, Arc::new(self.index()), decoders, executor)
            .await
            .expect("fixture mosaic should open")
    }
}
