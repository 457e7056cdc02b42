//! Read request generation.

use crate::config::BenchConfig;
use chrono::{DateTime, Utc};
use mosaic_common::{BoundingBox, TimeSelection};
use mosaic_core::ReadRequest;
use rand::prelude::*;

/// Generates random read requests over a mosaic envelope.
pub struct RequestGenerator {
    config: BenchConfig,
    envelope: BoundingBox,
    times: Vec<DateTime<Utc>>,
    rng: StdRng,
}

impl RequestGenerator {
    pub fn new(config: BenchConfig, envelope: BoundingBox, times: Vec<DateTime<Utc>>) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            envelope,
            times,
            rng,
        }
    }

    /// Next request. About one in twenty misses the mosaic entirely.
    pub fn next_request(&mut self) -> ReadRequest {
        let (lo, hi) = self.config.output_size;
        let width = self.rng.gen_range(lo..=hi);
        let aspect: f64 = self.rng.gen_range(0.5..2.0);
        let height = ((width as f64 / aspect).round() as usize).max(1);

        // Resolution from native up to twice the coarsest overview.
        let coarsest = *self.config.overviews.last().unwrap_or(&1) as f64;
        let zoom = self.rng.gen_range(0.0..(2.0 * coarsest).log2().max(0.1));
        let resolution = 2f64.powf(zoom);

        let span_x = (width as f64 * resolution).min(self.envelope.width());
        let span_y = (height as f64 * resolution).min(self.envelope.height());

        let bbox = if self.rng.gen_bool(0.05) {
            let min_x = self.envelope.max_x + self.rng.gen_range(1.0..100.0);
            BoundingBox::new(min_x, self.envelope.min_y, min_x + span_x, self.envelope.min_y + span_y)
        } else {
            // Allow requests to hang over the envelope edge by a little.
            let slack_x = span_x * 0.1;
            let slack_y = span_y * 0.1;
            let min_x = self.rng.gen_range(
                self.envelope.min_x - slack_x..=self.envelope.max_x - span_x + slack_x,
            );
            let min_y = self.rng.gen_range(
                self.envelope.min_y - slack_y..=self.envelope.max_y - span_y + slack_y,
            );
            BoundingBox::new(min_x, min_y, min_x + span_x, min_y + span_y)
        };

        let mut request = ReadRequest::new(bbox)
            .with_size(width, height)
            .with_policy(self.config.policy);

        if !self.times.is_empty() && self.rng.gen_bool(0.2) {
            let time = self.times[self.rng.gen_range(0..self.times.len())];
            request = request.with_time(TimeSelection::At(time));
        }
        if self.rng.gen_bool(self.config.blend_ratio) {
            request = request.blended();
        }
        request
    }

    /// A batch of requests.
    pub fn generate(&mut self, count: u64) -> Vec<ReadRequest> {
        (0..count).map(|_| self.next_request()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(seed: u64) -> RequestGenerator {
        let config = BenchConfig {
            seed: Some(seed),
            ..Default::default()
        };
        RequestGenerator::new(config, BoundingBox::new(0.0, 0.0, 256.0, 256.0), Vec::new())
    }

    #[test]
    fn test_seeded_generator_is_reproducible() {
        let a = generator(7).generate(20);
        let b = generator(7).generate(20);
        assert_eq!(a, b);
    }

    #[test]
    fn test_requests_are_valid() {
        for request in generator(3).generate(200) {
            assert!(request.validate().is_ok(), "{:?}", request);
            assert!(request.resolution.is_some());
        }
    }
}
