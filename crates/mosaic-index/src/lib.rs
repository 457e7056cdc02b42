//! Granule index for raster mosaics.
//!
//! The index stores one record per granule: its footprint and a bag of
//! attributes (location, time, elevation, ...). The mosaic reader only talks
//! to it through the [`GranuleIndex`] trait so that a database-backed index
//! and the in-memory [`MemoryIndex`] are interchangeable.

pub mod error;
pub mod memory;
pub mod query;
pub mod record;

pub use error::{IndexError, Result};
pub use memory::MemoryIndex;
pub use query::{Filter, IndexQuery, SortBy};
pub use record::{AttributeValue, IndexRecord, RecordId};

use async_trait::async_trait;
use mosaic_common::BoundingBox;

/// Query interface over a granule index.
#[async_trait]
pub trait GranuleIndex: Send + Sync {
    /// Records matching `query.filter`, ordered by `query.sort_by` when set.
    ///
    /// Fails with [`IndexError::SortingNotSupported`] if a sort is requested
    /// from an index whose [`supports_sorting`](Self::supports_sorting) is
    /// false.
    async fn query(&self, query: &IndexQuery) -> Result<Vec<IndexRecord>>;

    /// Maximum value of `attribute` among records matching `filter`, together
    /// with the id of a record holding it.
    async fn aggregate_max(
        &self,
        attribute: &str,
        filter: &Filter,
    ) -> Result<Option<(AttributeValue, RecordId)>>;

    /// Whether [`query`](Self::query) honours `sort_by`.
    fn supports_sorting(&self) -> bool;

    /// Union of all footprints, `None` for an empty index.
    async fn bounds(&self) -> Result<Option<BoundingBox>>;

    /// Distinct values of `attribute`, ascending.
    async fn distinct_values(&self, attribute: &str) -> Result<Vec<AttributeValue>>;
}
