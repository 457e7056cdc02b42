//! Metrics collection and statistics.

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Outcome of a single read.
#[derive(Debug, Clone)]
pub enum ReadSample {
    Mosaic {
        latency_us: u64,
        pixels: usize,
        granules_matched: usize,
        granules_loaded: usize,
    },
    Empty {
        latency_us: u64,
    },
    Failed {
        latency_us: u64,
        error: String,
    },
}

/// Collects metrics during a benchmark run.
pub struct MetricsCollector {
    histogram: Histogram<u64>,
    reads_total: u64,
    reads_empty: u64,
    reads_failed: u64,
    pixels_total: u64,
    granules_matched: u64,
    granules_loaded: u64,
    errors: Vec<String>,
    start_time: Instant,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            histogram: Histogram::new(3)?,
            reads_total: 0,
            reads_empty: 0,
            reads_failed: 0,
            pixels_total: 0,
            granules_matched: 0,
            granules_loaded: 0,
            errors: Vec::new(),
            start_time: Instant::now(),
        })
    }

    pub fn record(&mut self, sample: ReadSample) {
        self.reads_total += 1;
        let latency_us = match sample {
            ReadSample::Mosaic {
                latency_us,
                pixels,
                granules_matched,
                granules_loaded,
            } => {
                self.pixels_total += pixels as u64;
                self.granules_matched += granules_matched as u64;
                self.granules_loaded += granules_loaded as u64;
                latency_us
            }
            ReadSample::Empty { latency_us } => {
                self.reads_empty += 1;
                latency_us
            }
            ReadSample::Failed { latency_us, error } => {
                self.reads_failed += 1;
                if self.errors.len() < 10 {
                    self.errors.push(error);
                }
                latency_us
            }
        };
        self.histogram.record(latency_us.max(1)).ok();
    }

    /// Generate final results.
    pub fn results(&self, config_name: String, concurrency: usize, pooled: bool) -> BenchResults {
        let duration_secs = self.start_time.elapsed().as_secs_f64();
        let per_second = |n: u64| {
            if duration_secs > 0.0 {
                n as f64 / duration_secs
            } else {
                0.0
            }
        };
        let load_ratio = if self.granules_matched > 0 {
            self.granules_loaded as f64 / self.granules_matched as f64 * 100.0
        } else {
            100.0
        };

        BenchResults {
            timestamp: chrono::Utc::now().to_rfc3339(),
            config_name,
            concurrency,
            pooled,
            duration_secs,
            total_reads: self.reads_total,
            empty_reads: self.reads_empty,
            failed_reads: self.reads_failed,
            reads_per_second: per_second(self.reads_total),
            megapixels_per_second: per_second(self.pixels_total) / 1_000_000.0,
            granules_per_read: if self.reads_total > 0 {
                self.granules_matched as f64 / self.reads_total as f64
            } else {
                0.0
            },
            granule_load_rate: load_ratio,
            latency_p50: self.histogram.value_at_percentile(50.0) as f64 / 1000.0,
            latency_p90: self.histogram.value_at_percentile(90.0) as f64 / 1000.0,
            latency_p99: self.histogram.value_at_percentile(99.0) as f64 / 1000.0,
            latency_min: self.histogram.min() as f64 / 1000.0,
            latency_max: self.histogram.max() as f64 / 1000.0,
            latency_avg: self.histogram.mean() / 1000.0,
            errors: self.errors.clone(),
        }
    }
}

/// Final benchmark results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchResults {
    pub timestamp: String,
    pub config_name: String,
    pub concurrency: usize,
    pub pooled: bool,
    pub duration_secs: f64,
    pub total_reads: u64,
    pub empty_reads: u64,
    pub failed_reads: u64,
    pub reads_per_second: f64,
    pub megapixels_per_second: f64,
    pub granules_per_read: f64,
    /// Percentage of matched granules that loaded.
    pub granule_load_rate: f64,
    /// Latencies in milliseconds.
    pub latency_p50: f64,
    pub latency_p90: f64,
    pub latency_p99: f64,
    pub latency_min: f64,
    pub latency_max: f64,
    pub latency_avg: f64,
    /// First few error messages.
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut metrics = MetricsCollector::new().unwrap();
        metrics.record(ReadSample::Mosaic {
            latency_us: 2_000,
            pixels: 100,
            granules_matched: 4,
            granules_loaded: 3,
        });
        metrics.record(ReadSample::Empty { latency_us: 10 });
        metrics.record(ReadSample::Failed {
            latency_us: 50,
            error: "too many granules".to_string(),
        });

        let results = metrics.results("t".to_string(), 1, true);
        assert_eq!(results.total_reads, 3);
        assert_eq!(results.empty_reads, 1);
        assert_eq!(results.failed_reads, 1);
        assert!((results.granule_load_rate - 75.0).abs() < 1e-9);
        assert_eq!(results.errors, vec!["too many granules".to_string()]);
        assert!(results.latency_max >= 1.9);
    }
}
