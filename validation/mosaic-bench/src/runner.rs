//! Benchmark orchestration.

use crate::config::BenchConfig;
use crate::generator::RequestGenerator;
use crate::metrics::{BenchResults, MetricsCollector, ReadSample};
use indicatif::{ProgressBar, ProgressStyle};
use mosaic_core::{ExecutorConfig, GranuleExecutor, RasterManager, ReadOutcome, ReadRequest};
use std::sync::Arc;
use std::time::Instant;
use test_utils::{first_difference, MosaicFixture};
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Result of comparing pooled and inline execution.
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub requests: u64,
    pub empty: u64,
    pub mismatches: Vec<String>,
}

/// Runs scenarios against a synthetic mosaic.
pub struct BenchRunner {
    config: BenchConfig,
    fixture: MosaicFixture,
}

impl BenchRunner {
    pub fn new(config: BenchConfig) -> Self {
        let fixture = config.fixture();
        Self { config, fixture }
    }

    async fn open(&self, executor: GranuleExecutor) -> anyhow::Result<RasterManager> {
        let decoders = mosaic_core::DecoderRegistry::new().register(Arc::new(self.fixture.decoder()));
        let manager = RasterManager::open(
            self.fixture.config(),
            Arc::new(self.fixture.index()),
            decoders,
            Some(Arc::new(executor)),
        )
        .await?;
        Ok(manager)
    }

    fn requests(&self) -> Vec<ReadRequest> {
        RequestGenerator::new(
            self.config.clone(),
            self.fixture.envelope(),
            self.fixture.times.clone(),
        )
        .generate(self.config.requests)
    }

    /// Run the benchmark.
    pub async fn run(&self) -> anyhow::Result<BenchResults> {
        let executor = GranuleExecutor::from_config(&ExecutorConfig {
            pooling: self.config.pooling,
            workers: self.config.workers,
        });
        let pooled = executor.is_pooled();
        let manager = Arc::new(self.open(executor).await?);
        let requests = self.requests();

        info!(
            scenario = %self.config.name,
            granules = self.fixture.records().len(),
            requests = requests.len(),
            concurrency = self.config.concurrency,
            pooled,
            "Starting benchmark"
        );

        let pb = ProgressBar::new(requests.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} reads {msg}")?
                .progress_chars("##-"),
        );

        let mut metrics = MetricsCollector::new()?;
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut handles = Vec::with_capacity(requests.len());

        for request in requests {
            let permit = semaphore.clone().acquire_owned().await?;
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                let start = Instant::now();
                let outcome = manager.read(&request).await;
                let latency_us = start.elapsed().as_micros() as u64;
                drop(permit);
                match outcome {
                    Ok(ReadOutcome::Mosaic(mosaic)) => ReadSample::Mosaic {
                        latency_us,
                        pixels: mosaic.bounds.area(),
                        granules_matched: mosaic.matched,
                        granules_loaded: mosaic.loaded,
                    },
                    Ok(ReadOutcome::Empty) => ReadSample::Empty { latency_us },
                    Err(e) => ReadSample::Failed {
                        latency_us,
                        error: e.to_string(),
                    },
                }
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(sample) => metrics.record(sample),
                Err(e) => warn!(error = %e, "Read task failed"),
            }
            pb.inc(1);
        }
        pb.finish_with_message("done");

        let stats = manager.granule_cache_stats().await;
        info!(
            hits = stats.hits,
            misses = stats.misses,
            hit_rate = stats.hit_rate(),
            "Granule cache"
        );
        manager.dispose().await;

        Ok(metrics.results(self.config.name.clone(), self.config.concurrency, pooled))
    }

    /// Issue a single read against the scenario mosaic.
    pub async fn read_once(&self, request: &ReadRequest) -> anyhow::Result<ReadOutcome> {
        let executor = GranuleExecutor::from_config(&ExecutorConfig {
            pooling: self.config.pooling,
            workers: self.config.workers,
        });
        let manager = self.open(executor).await?;
        let outcome = manager.read(request).await;
        manager.dispose().await;
        Ok(outcome?)
    }

    /// Read every request through a pooled and an inline executor and
    /// report any output that differs.
    pub async fn verify(&self) -> anyhow::Result<VerifyReport> {
        let pooled = self
            .open(GranuleExecutor::pooled(self.config.workers))
            .await?;
        let inline = self.open(GranuleExecutor::inline()).await?;

        let mut report = VerifyReport {
            requests: 0,
            empty: 0,
            mismatches: Vec::new(),
        };

        for (i, request) in self.requests().into_iter().enumerate() {
            report.requests += 1;
            let a = pooled.read(&request).await;
            let b = inline.read(&request).await;

            let mismatch = match (a, b) {
                (Ok(ReadOutcome::Empty), Ok(ReadOutcome::Empty)) => {
                    report.empty += 1;
                    None
                }
                (Ok(ReadOutcome::Mosaic(a)), Ok(ReadOutcome::Mosaic(b))) => {
                    if a.bounds != b.bounds || a.raster.layout != b.raster.layout {
                        Some(format!("request {}: output grids differ", i))
                    } else {
                        first_difference(&a.raster, &b.raster)
                            .map(|s| format!("request {}: sample {} differs", i, s))
                    }
                }
                (Err(a), Err(b)) if a.to_string() == b.to_string() => None,
                (a, b) => Some(format!(
                    "request {}: pooled {} vs inline {}",
                    i,
                    describe(&a),
                    describe(&b)
                )),
            };
            if let Some(m) = mismatch {
                warn!(mismatch = %m, "Executors disagree");
                report.mismatches.push(m);
            }
        }

        Ok(report)
    }
}

fn describe(outcome: &mosaic_core::Result<ReadOutcome>) -> String {
    match outcome {
        Ok(ReadOutcome::Empty) => "empty".to_string(),
        Ok(ReadOutcome::Mosaic(m)) => format!("{}x{} mosaic", m.raster.width, m.raster.height),
        Err(e) => format!("error '{}'", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> BenchConfig {
        BenchConfig {
            grid_cols: 2,
            grid_rows: 2,
            granule_size: 16,
            overviews: vec![1, 2],
            requests: 20,
            output_size: (4, 24),
            blend_ratio: 0.2,
            seed: Some(11),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_counts_every_read() {
        let results = BenchRunner::new(tiny()).run().await.unwrap();
        assert_eq!(results.total_reads, 20);
        assert_eq!(results.failed_reads, 0);
    }

    #[tokio::test]
    async fn test_read_once() {
        let runner = BenchRunner::new(tiny());
        let bbox = mosaic_common::BoundingBox::new(0.0, 0.0, 32.0, 32.0);
        let outcome = runner
            .read_once(&ReadRequest::new(bbox).with_size(16, 16))
            .await
            .unwrap();
        let mosaic = outcome.into_mosaic().unwrap();
        assert_eq!((mosaic.raster.width, mosaic.raster.height), (16, 16));
        assert_eq!(mosaic.matched, 4);

        let missed = mosaic_common::BoundingBox::new(100.0, 100.0, 120.0, 120.0);
        assert!(runner.read_once(&ReadRequest::new(missed)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pooled_and_inline_agree() {
        let report = BenchRunner::new(tiny()).verify().await.unwrap();
        assert_eq!(report.requests, 20);
        assert!(report.mismatches.is_empty(), "{:?}", report.mismatches);
    }
}
