//! Cache implementations for the mosaic reader.

mod granule_cache;

pub use granule_cache::{CacheStats, GranuleCache};
