//! LRU cache of resolved granules, keyed by location.

use crate::granule::Granule;
use lru::LruCache;
use mosaic_common::BoundingBox;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Granules shared across requests.
///
/// A hit requires the same location *and* footprint; a record whose
/// footprint changed replaces the stale entry.
pub struct GranuleCache {
    cache: LruCache<String, Arc<Granule>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl GranuleCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a granule, counting a hit or a miss.
    pub fn get(&mut self, location: &str, footprint: &BoundingBox) -> Option<Arc<Granule>> {
        match self.cache.get(location) {
            Some(granule) if granule.footprint() == footprint => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(granule.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&mut self, granule: Arc<Granule>) {
        self.cache.put(granule.location().to_string(), granule);
    }

    /// Cached granule for `location`, building and caching it on a miss.
    pub fn get_or_insert_with<E>(
        &mut self,
        location: &str,
        footprint: &BoundingBox,
        build: impl FnOnce() -> Result<Granule, E>,
    ) -> Result<Arc<Granule>, E> {
        if let Some(granule) = self.get(location, footprint) {
            return Ok(granule);
        }
        let granule = Arc::new(build()?);
        self.insert(granule.clone());
        Ok(granule)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
            capacity: self.cache.cap().get(),
        }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
