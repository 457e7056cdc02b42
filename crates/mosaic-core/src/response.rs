//! One read request, end to end.
//!
//! ```text
//! EMPTY ──► PREPARING ──► LOADING ──► COMPOSITING ──► PACKAGING ──► DONE
//!               │
//!               └──► EMPTY  (request disjoint from the mosaic envelope)
//! ```

use crate::compositor::{Composite, MosaicCompositor};
use crate::error::{MosaicError, Result};
use crate::loader::{GranuleLoader, LoadContext, LoadedTile};
use crate::manager::RasterManager;
use crate::overview::{select_level, LevelSelection};
use crate::raster::{ColorInterpretation, ColorModel, PixelLayout, Raster, SampleType};
use crate::request::ReadRequest;
use mosaic_common::{BoundingBox, CrsCode, GridToWorld, PixelBounds, TimeSelection};
use mosaic_index::{Filter, IndexQuery, IndexRecord, SortBy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Processing stage of a [`RasterLayerResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseState {
    Empty,
    Preparing,
    Loading,
    Compositing,
    Packaging,
    Done,
}

/// Metadata of one output band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDimension {
    pub name: String,
    pub data_type: SampleType,
    pub color_interpretation: ColorInterpretation,
    pub no_data: Option<f64>,
    pub range: (f64, f64),
}

/// A composited answer to a read request.
#[derive(Debug, Clone)]
pub struct MosaicResponse {
    pub raster: Raster,
    /// Output pixel bounds in `grid_to_world` pixel space.
    pub bounds: PixelBounds,
    pub grid_to_world: GridToWorld,
    pub bands: Vec<SampleDimension>,
    pub crs: CrsCode,
    /// Overview level read.
    pub level: usize,
    pub subsampling_x: u32,
    pub subsampling_y: u32,
    /// Granules returned by the index.
    pub matched: usize,
    /// Granules that contributed a tile.
    pub loaded: usize,
}

impl MosaicResponse {
    /// World area actually covered by the output raster.
    pub fn world_bounds(&self) -> BoundingBox {
        self.grid_to_world.pixel_bounds_to_world(&self.bounds)
    }
}

/// Result of a read.
#[derive(Debug, Clone)]
pub enum ReadOutcome {
    /// The request does not touch the mosaic.
    Empty,
    Mosaic(MosaicResponse),
}

impl ReadOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, ReadOutcome::Empty)
    }

    pub fn mosaic(&self) -> Option<&MosaicResponse> {
        match self {
            ReadOutcome::Mosaic(m) => Some(m),
            ReadOutcome::Empty => None,
        }
    }

    pub fn into_mosaic(self) -> Option<MosaicResponse> {
        match self {
            ReadOutcome::Mosaic(m) => Some(m),
            ReadOutcome::Empty => None,
        }
    }
}

/// Output grid chosen in the PREPARING stage.
struct Prepared {
    selection: LevelSelection,
    grid_to_world: GridToWorld,
    bounds: PixelBounds,
}

/// Drives one request through the pipeline.
pub struct RasterLayerResponse<'a> {
    manager: &'a RasterManager,
    request: &'a ReadRequest,
    state: ResponseState,
}

impl<'a> RasterLayerResponse<'a> {
    pub fn new(manager: &'a RasterManager, request: &'a ReadRequest) -> Self {
        Self {
            manager,
            request,
            state: ResponseState::Empty,
        }
    }

    pub fn state(&self) -> ResponseState {
        self.state
    }

    fn transition(&mut self, next: ResponseState) {
        debug!(from = ?self.state, to = ?next, "Response state");
        self.state = next;
    }

    pub async fn process(mut self) -> Result<ReadOutcome> {
        let manager = self.manager;
        self.request
            .validate()
            .map_err(MosaicError::InvalidRequest)?;

        self.transition(ResponseState::Preparing);
        let Some(prepared) = self.prepare()? else {
            self.transition(ResponseState::Empty);
            return Ok(ReadOutcome::Empty);
        };

        self.transition(ResponseState::Loading);
        let records = self.select_records().await?;
        let matched = records.len();
        let max = self
            .request
            .max_granules
            .unwrap_or(manager.config().max_granules);
        if matched > max {
            return Err(MosaicError::RequestTooLarge { matched, max });
        }
        let tiles = self.load(&records, &prepared).await;
        let loaded = tiles.len();
        debug!(matched, loaded, "Granules loaded");

        self.transition(ResponseState::Compositing);
        let config = manager.config();
        let background = self
            .request
            .background
            .as_deref()
            .or(config.background.as_deref());
        let fallback: PixelLayout = config.default_layout.into();
        let composite = MosaicCompositor::composite(
            tiles,
            prepared.bounds,
            self.request.mode,
            background,
            &fallback,
        );

        self.transition(ResponseState::Packaging);
        let bands = sample_dimensions(&composite);
        let response = MosaicResponse {
            raster: composite.raster,
            bounds: prepared.bounds,
            grid_to_world: prepared.grid_to_world,
            bands,
            crs: config.crs,
            level: prepared.selection.level,
            subsampling_x: prepared.selection.subsampling_x,
            subsampling_y: prepared.selection.subsampling_y,
            matched,
            loaded,
        };

        self.transition(ResponseState::Done);
        Ok(ReadOutcome::Mosaic(response))
    }

    /// Pick the level and output grid. `None` when the request misses the
    /// mosaic.
    fn prepare(&self) -> Result<Option<Prepared>> {
        let envelope = self.manager.envelope();
        if !self.request.bbox.intersects(envelope) {
            debug!(bbox = %self.request.bbox, envelope = %envelope, "Request outside mosaic");
            return Ok(None);
        }

        let config = self.manager.config();
        let native = config.levels[0];
        let requested = self.request.resolution.unwrap_or(native);
        let policy = self.request.policy.unwrap_or(config.overview_policy);
        let selection = select_level(requested, policy, &config.levels);
        let level = config.levels[selection.level];

        let native_grid = GridToWorld::north_up(envelope.min_x, envelope.max_y, native.x, native.y);
        let grid_to_world = native_grid.scaled(
            level.x * selection.subsampling_x as f64 / native.x,
            level.y * selection.subsampling_y as f64 / native.y,
        );

        let bounds = grid_to_world
            .world_to_pixel_bounds(&self.request.bbox)
            .ok_or_else(|| {
                MosaicError::invalid_request(format!(
                    "cannot map {} onto the output grid",
                    self.request.bbox
                ))
            })?;

        let max = config.max_output_pixels;
        if !bounds.checked_area().is_some_and(|pixels| pixels <= max) {
            return Err(MosaicError::invalid_request(format!(
                "output of {}x{} pixels exceeds the limit of {} pixels",
                bounds.width, bounds.height, max
            )));
        }

        debug!(
            policy = %policy,
            level = selection.level,
            subsampling_x = selection.subsampling_x,
            subsampling_y = selection.subsampling_y,
            width = bounds.width,
            height = bounds.height,
            "Prepared output grid"
        );

        Ok(Some(Prepared {
            selection,
            grid_to_world,
            bounds,
        }))
    }

    /// Index records for the request: footprint intersection, exact
    /// elevation, and an exact or most-recent time.
    async fn select_records(&self) -> Result<Vec<IndexRecord>> {
        let config = self.manager.config();
        let index = self.manager.index();

        let mut filter = Filter::intersects(self.request.bbox);
        if let Some(elevation) = self.request.elevation {
            match &config.elevation_attribute {
                Some(attr) => filter = filter.and(Filter::equals(attr, elevation)),
                None => debug!(elevation, "Mosaic has no elevation attribute, ignoring"),
            }
        }

        let records = match (&config.time_attribute, self.request.time) {
            (Some(attr), Some(TimeSelection::At(time))) => {
                let filter = filter.and(Filter::equals(attr, time));
                index.query(&IndexQuery::new(filter)).await?
            }
            (Some(attr), _) => self.most_recent(filter, attr).await?,
            (None, _) => index.query(&IndexQuery::new(filter)).await?,
        };
        Ok(records)
    }

    /// Granules carrying the maximum time among those matching `filter`.
    async fn most_recent(&self, filter: Filter, attr: &str) -> Result<Vec<IndexRecord>> {
        let index = self.manager.index();

        if index.supports_sorting() {
            let sorted = index
                .query(&IndexQuery::new(filter).sorted_by(SortBy::descending(attr)))
                .await?;
            let Some(latest) = sorted.first().and_then(|r| r.attribute(attr)).cloned() else {
                return Ok(sorted);
            };
            return Ok(sorted
                .into_iter()
                .filter(|r| r.attribute(attr) == Some(&latest))
                .collect());
        }

        // No sort support: find the maximum and the record holding it, then
        // query again for everything at that time.
        let Some((value, owner)) = index.aggregate_max(attr, &filter).await? else {
            return Ok(index.query(&IndexQuery::new(filter)).await?);
        };
        let owner_records = index.query(&IndexQuery::new(Filter::Id(owner))).await?;
        let latest = owner_records
            .first()
            .and_then(|r| r.attribute(attr))
            .cloned()
            .unwrap_or(value);
        debug!(time = %latest, "Most recent time from aggregate");
        Ok(index
            .query(&IndexQuery::new(filter.and(Filter::equals(attr, latest))))
            .await?)
    }

    /// Run one load per record on the executor. Results keep record order.
    async fn load(&self, records: &[IndexRecord], prepared: &Prepared) -> Vec<LoadedTile> {
        let config = self.manager.config();
        let level = config.levels[prepared.selection.level];

        let ctx = Arc::new(LoadContext {
            level: prepared.selection.level,
            level_resolution: level,
            subsampling_x: prepared.selection.subsampling_x,
            subsampling_y: prepared.selection.subsampling_y,
            grid_to_world: prepared.grid_to_world,
            bounds: prepared.bounds,
            transparent_color: self.request.transparent_color.clone(),
            decoder_hint: self.request.decoder_hint.clone(),
            suggested_decoder: config.suggested_decoder.clone(),
            decoders: self.manager.decoders(),
        });

        let mut tasks = Vec::with_capacity(records.len());
        for record in records {
            let Some(granule) = self.manager.granule_for(record).await else {
                continue;
            };
            let ctx = ctx.clone();
            tasks.push(move || GranuleLoader::load(&granule, &ctx));
        }

        self.manager
            .executor()
            .run_all(tasks)
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

fn sample_dimensions(composite: &Composite) -> Vec<SampleDimension> {
    let layout = &composite.raster.layout;
    let range = match &layout.color_model {
        ColorModel::Indexed(palette) => (0.0, palette.entries.len().saturating_sub(1) as f64),
        ColorModel::Component => layout.sample_type.range(),
    };

    ColorInterpretation::for_layout(layout)
        .into_iter()
        .enumerate()
        .map(|(i, interpretation)| SampleDimension {
            name: band_name(interpretation, i),
            data_type: layout.sample_type,
            color_interpretation: interpretation,
            no_data: composite.background.get(i).copied(),
            range,
        })
        .collect()
}

fn band_name(interpretation: ColorInterpretation, index: usize) -> String {
    match interpretation {
        ColorInterpretation::Gray => "gray".to_string(),
        ColorInterpretation::Red => "red".to_string(),
        ColorInterpretation::Green => "green".to_string(),
        ColorInterpretation::Blue => "blue".to_string(),
        ColorInterpretation::Alpha => "alpha".to_string(),
        ColorInterpretation::Palette => "palette_index".to_string(),
        ColorInterpretation::Undefined => format!("band_{}", index + 1),
    }
}
