//! Process-lifetime state of one mosaic.

use crate::cache::{CacheStats, GranuleCache};
use crate::config::MosaicConfig;
use crate::decoder::DecoderRegistry;
use crate::error::{MosaicError, Result};
use crate::executor::GranuleExecutor;
use crate::granule::Granule;
use crate::request::ReadRequest;
use crate::response::{RasterLayerResponse, ReadOutcome};
use chrono::{DateTime, Utc};
use mosaic_common::{BoundingBox, CrsCode};
use mosaic_index::{AttributeValue, GranuleIndex, IndexRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

/// Entry point for reading a mosaic.
///
/// Holds the configuration, the index handle, the decoder table and the
/// granule cache. Cheap to share behind an `Arc`; `read` takes `&self` and
/// may be called concurrently.
pub struct RasterManager {
    config: Arc<MosaicConfig>,
    index: Arc<dyn GranuleIndex>,
    decoders: Arc<DecoderRegistry>,
    executor: Arc<GranuleExecutor>,
    granules: RwLock<GranuleCache>,
    envelope: BoundingBox,
    disposed: AtomicBool,
}

impl RasterManager {
    /// Open a mosaic.
    ///
    /// `executor` lets several mosaics share one worker pool; when `None`
    /// one is built from `config.executor`.
    #[instrument(skip_all, fields(mosaic = %config.name))]
    pub async fn open(
        config: MosaicConfig,
        index: Arc<dyn GranuleIndex>,
        decoders: DecoderRegistry,
        executor: Option<Arc<GranuleExecutor>>,
    ) -> Result<Self> {
        config.validate().map_err(MosaicError::Configuration)?;

        if decoders.is_empty() {
            return Err(MosaicError::configuration("no granule decoders registered"));
        }
        if let Some(suggested) = &config.suggested_decoder {
            if decoders.get(suggested).is_none() {
                warn!(decoder = %suggested, "Suggested decoder is not registered");
            }
        }

        let envelope = match config.envelope {
            Some(envelope) => envelope,
            None => index
                .bounds()
                .await
                .map_err(|e| MosaicError::configuration(format!("index unavailable: {}", e)))?
                .filter(|b| b.is_valid() && !b.is_empty())
                .ok_or_else(|| {
                    MosaicError::configuration("index is empty and no envelope is configured")
                })?,
        };

        let executor =
            executor.unwrap_or_else(|| Arc::new(GranuleExecutor::from_config(&config.executor)));

        info!(
            envelope = %envelope,
            levels = config.levels.len(),
            crs = %config.crs,
            pooled = executor.is_pooled(),
            decoders = ?decoders.formats(),
            "Opened mosaic"
        );

        Ok(Self {
            granules: RwLock::new(GranuleCache::new(config.granule_cache_size)),
            config: Arc::new(config),
            index,
            decoders: Arc::new(decoders),
            executor,
            envelope,
            disposed: AtomicBool::new(false),
        })
    }

    /// Read the mosaic.
    #[instrument(skip(self, request), fields(mosaic = %self.config.name, bbox = %request.bbox))]
    pub async fn read(&self, request: &ReadRequest) -> Result<ReadOutcome> {
        if self.is_disposed() {
            return Err(MosaicError::Disposed);
        }
        RasterLayerResponse::new(self, request).process().await
    }

    /// Release cached state. Later reads fail with [`MosaicError::Disposed`].
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.granules.write().await.clear();
        info!(mosaic = %self.config.name, "Disposed mosaic");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &MosaicConfig {
        &self.config
    }

    pub fn envelope(&self) -> &BoundingBox {
        &self.envelope
    }

    pub fn crs(&self) -> CrsCode {
        self.config.crs
    }

    pub fn index(&self) -> &dyn GranuleIndex {
        self.index.as_ref()
    }

    pub fn decoders(&self) -> Arc<DecoderRegistry> {
        self.decoders.clone()
    }

    pub fn executor(&self) -> &GranuleExecutor {
        &self.executor
    }

    pub async fn granule_cache_stats(&self) -> CacheStats {
        self.granules.read().await.stats()
    }

    /// Distinct granule times, ascending. Empty for mosaics without a time
    /// attribute.
    pub async fn available_times(&self) -> Result<Vec<DateTime<Utc>>> {
        let Some(attr) = &self.config.time_attribute else {
            return Ok(Vec::new());
        };
        let values = self.index.distinct_values(attr).await?;
        Ok(values.iter().filter_map(AttributeValue::as_time).collect())
    }

    /// Distinct granule elevations, ascending.
    pub async fn available_elevations(&self) -> Result<Vec<f64>> {
        let Some(attr) = &self.config.elevation_attribute else {
            return Ok(Vec::new());
        };
        let values = self.index.distinct_values(attr).await?;
        Ok(values.iter().filter_map(AttributeValue::as_number).collect())
    }

    /// Granule for an index record, through the cache. `None` (logged) when
    /// the record can't describe a granule.
    pub(crate) async fn granule_for(&self, record: &IndexRecord) -> Option<Arc<Granule>> {
        let config = &self.config;
        let Some(location) = record.text(&config.location_attribute) else {
            warn!(granule = %record.id, attribute = %config.location_attribute, "Granule has no location");
            return None;
        };

        let mut cache = self.granules.write().await;
        let result = cache.get_or_insert_with(location, &record.footprint, || {
            Granule::from_record(
                record,
                &config.location_attribute,
                config.decoder_attribute.as_deref(),
                config.path_resolver(),
            )
        });

        match result {
            Ok(granule) => Some(granule),
            Err(e) => {
                warn!(granule = %record.id, error = %e, "Skipping granule");
                None
            }
        }
    }
}
