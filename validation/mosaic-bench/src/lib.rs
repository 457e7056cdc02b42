//! Benchmark and consistency checks for the raster mosaic engine.
//!
//! This crate provides tools to:
//! - Build a synthetic mosaic of any size from the shared test fixtures
//! - Generate random read requests (mixed sizes, resolutions, times, modes)
//! - Measure read latency and throughput under controlled concurrency
//! - Check that pooled and inline granule execution produce identical output
//! - Issue single reads and describe the response

pub mod config;
pub mod generator;
pub mod metrics;
pub mod report;
pub mod runner;

pub use config::BenchConfig;
pub use generator::RequestGenerator;
pub use metrics::{BenchResults, MetricsCollector, ReadSample};
pub use report::ResultsReport;
pub use runner::{BenchRunner, VerifyReport};
