//! Scenario configuration loading and management.

use mosaic_core::OverviewPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use test_utils::MosaicFixture;

/// A benchmark scenario, loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub name: String,
    pub description: String,

    /// Granule grid of the synthetic mosaic.
    pub grid_cols: usize,
    pub grid_rows: usize,
    /// Pixels per granule side at native resolution.
    pub granule_size: usize,
    /// Decimation factor of each overview level, starting with 1.
    pub overviews: Vec<usize>,
    /// Copies of the grid at successive times (0 = no time dimension).
    pub time_steps: usize,

    pub requests: u64,
    /// Reads in flight at once.
    pub concurrency: usize,
    /// Granule loads in flight per read.
    pub workers: usize,
    pub pooling: bool,
    pub policy: OverviewPolicy,
    /// Output width range in pixels, inclusive.
    pub output_size: (usize, usize),
    /// Fraction of requests composited with BLEND.
    pub blend_ratio: f64,
    /// Optional RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            description: String::new(),
            grid_cols: 4,
            grid_rows: 4,
            granule_size: 64,
            overviews: vec![1, 2, 4],
            time_steps: 0,
            requests: 100,
            concurrency: 4,
            workers: 4,
            pooling: true,
            policy: OverviewPolicy::Nearest,
            output_size: (64, 256),
            blend_ratio: 0.0,
            seed: None,
        }
    }
}

impl BenchConfig {
    /// Load a scenario file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BenchConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.grid_cols == 0 || self.grid_rows == 0 || self.granule_size == 0 {
            anyhow::bail!("grid must have at least one granule of at least one pixel");
        }
        if self.overviews.first() != Some(&1) {
            anyhow::bail!("first overview factor must be 1");
        }
        if self.overviews.windows(2).any(|w| w[1] < w[0]) {
            anyhow::bail!("overview factors must not decrease");
        }
        if self.requests == 0 {
            anyhow::bail!("requests must be > 0");
        }
        if self.concurrency == 0 || self.workers == 0 {
            anyhow::bail!("concurrency and workers must be > 0");
        }
        let (lo, hi) = self.output_size;
        if lo == 0 || hi < lo {
            anyhow::bail!("output_size must be a non-empty range of positive sizes");
        }
        if !(0.0..=1.0).contains(&self.blend_ratio) {
            anyhow::bail!("blend_ratio must be within [0, 1]");
        }
        Ok(())
    }

    /// Synthetic mosaic described by this scenario.
    pub fn fixture(&self) -> MosaicFixture {
        let fixture = MosaicFixture::grid(self.grid_cols, self.grid_rows, self.granule_size)
            .with_overviews(&self.overviews);
        if self.time_steps == 0 {
            return fixture;
        }
        let start = chrono::Utc::now();
        let times = (0..self.time_steps as i64)
            .map(|i| start - chrono::Duration::hours(i))
            .collect();
        fixture.with_times(times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_scenario_uses_defaults() {
        let config: BenchConfig =
            serde_json::from_str(r#"{"name": "tiny", "grid_cols": 2, "policy": "quality"}"#)
                .unwrap();
        assert_eq!(config.grid_cols, 2);
        assert_eq!(config.grid_rows, 4);
        assert_eq!(config.policy, OverviewPolicy::Quality);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_overviews() {
        let config = BenchConfig {
            overviews: vec![2, 4],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BenchConfig {
            overviews: vec![1, 4, 2],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fixture_with_times() {
        let config = BenchConfig {
            grid_cols: 2,
            grid_rows: 1,
            time_steps: 3,
            ..Default::default()
        };
        assert_eq!(config.fixture().records().len(), 6);
    }
}
