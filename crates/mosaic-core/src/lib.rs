//! Raster mosaic engine.
//!
//! Answers "give me this area at this resolution" over a collection of
//! source rasters (granules) described by a spatial index.
//!
//! # Architecture
//!
//! ```text
//! ReadRequest
//!      │
//!      ▼
//! RasterManager::read
//!      │
//!      ├─► Overview selector: level + subsampling for the request
//!      │
//!      ├─► Output grid and pixel bounds (rounded outward, >= 1x1)
//!      │
//!      ├─► Index query: bbox AND elevation AND (time | most recent)
//!      │
//!      ├─► One GranuleLoader task per granule on the GranuleExecutor
//!      │         │
//!      │         └─► failures are logged and the granule is skipped
//!      │
//!      └─► MosaicCompositor (OVERLAY | BLEND, background fill)
//!               │
//!               ▼
//!          MosaicResponse
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mosaic_core::{DecoderRegistry, MosaicConfig, RasterManager, ReadRequest};
//!
//! let decoders = DecoderRegistry::new().register(Arc::new(MyTiffDecoder));
//! let manager = RasterManager::open(config, index, decoders, None).await?;
//!
//! let request = ReadRequest::new(BoundingBox::new(-10.0, 40.0, 0.0, 50.0)).with_size(512, 512);
//! if let Some(mosaic) = manager.read(&request).await?.into_mosaic() {
//!     println!("{}x{} from {} granules", mosaic.raster.width, mosaic.raster.height, mosaic.loaded);
//! }
//! ```

pub mod cache;
pub mod compositor;
pub mod config;
pub mod decoder;
pub mod error;
pub mod executor;
pub mod granule;
pub mod loader;
pub mod manager;
pub mod overview;
pub mod raster;
pub mod request;
pub mod response;

// Re-export commonly used types at crate root
pub use cache::{CacheStats, GranuleCache};
pub use compositor::{CompositeMode, CompositingStrategy, MosaicCompositor};
pub use config::{MosaicConfig, OutputLayout};
pub use decoder::{DecodeRequest, DecodedRaster, DecoderRegistry, GranuleDecoder};
pub use error::{DecodeError, GranuleLoadError, MosaicError, Result};
pub use executor::{ExecutorConfig, GranuleExecutor};
pub use granule::{Granule, PathMode, PathResolver};
pub use loader::{GranuleLoader, LoadContext, LoadedTile};
pub use manager::RasterManager;
pub use overview::{select_level, LevelSelection, OverviewPolicy, ResolutionLevel};
pub use raster::{AlphaMask, ColorInterpretation, ColorModel, Palette, PixelLayout, Raster, SampleType};
pub use request::ReadRequest;
pub use response::{MosaicResponse, RasterLayerResponse, ReadOutcome, ResponseState, SampleDimension};
