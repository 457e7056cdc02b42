//! Read requests.
//!
//! # Examples
//!
//! ```rust
//! use mosaic_common::{BoundingBox, TimeSelection};
//! use mosaic_core::{OverviewPolicy, ReadRequest};
//!
//! let request = ReadRequest::new(BoundingBox::new(0.0, 0.0, 100.0, 50.0))
//!     .with_size(200, 100)
//!     .with_policy(OverviewPolicy::Quality)
//!     .with_time(TimeSelection::Latest)
//!     .with_elevation(500.0)
//!     .with_background(vec![0.0]);
//!
//! let res = request.resolution.unwrap();
//! assert_eq!((res.x, res.y), (0.5, 0.5));
//! ```

use crate::compositor::CompositeMode;
use crate::overview::{OverviewPolicy, ResolutionLevel};
use mosaic_common::{BoundingBox, TimeSelection};

/// One client read against a mosaic. Anything left unset falls back to the
/// mosaic configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    /// World area to read.
    pub bbox: BoundingBox,
    /// Requested pixel size; native resolution when `None`.
    pub resolution: Option<ResolutionLevel>,
    pub policy: Option<OverviewPolicy>,
    /// Time slice. On a time-aware mosaic `None` means the most recent.
    pub time: Option<TimeSelection>,
    /// Exact elevation to match.
    pub elevation: Option<f64>,
    /// Input color treated as transparent.
    pub transparent_color: Option<Vec<f64>>,
    pub background: Option<Vec<f64>>,
    pub mode: CompositeMode,
    pub max_granules: Option<usize>,
    /// Decoder to use for granules without their own hint.
    pub decoder_hint: Option<String>,
}

impl ReadRequest {
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            resolution: None,
            policy: None,
            time: None,
            elevation: None,
            transparent_color: None,
            background: None,
            mode: CompositeMode::Overlay,
            max_granules: None,
            decoder_hint: None,
        }
    }

    pub fn with_resolution(mut self, x: f64, y: f64) -> Self {
        self.resolution = Some(ResolutionLevel::new(x, y));
        self
    }

    /// Derive the resolution from an output size. A zero-extent axis borrows
    /// the other axis' resolution; a zero-area box keeps native resolution.
    pub fn with_size(mut self, width: usize, height: usize) -> Self {
        let rx = if width > 0 { self.bbox.width() / width as f64 } else { 0.0 };
        let ry = if height > 0 { self.bbox.height() / height as f64 } else { 0.0 };
        self.resolution = match (rx > 0.0, ry > 0.0) {
            (true, true) => Some(ResolutionLevel::new(rx, ry)),
            (true, false) => Some(ResolutionLevel::square(rx)),
            (false, true) => Some(ResolutionLevel::square(ry)),
            (false, false) => None,
        };
        self
    }

    pub fn with_policy(mut self, policy: OverviewPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_time(mut self, time: TimeSelection) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_transparent_color(mut self, color: Vec<f64>) -> Self {
        self.transparent_color = Some(color);
        self
    }

    pub fn with_background(mut self, values: Vec<f64>) -> Self {
        self.background = Some(values);
        self
    }

    pub fn blended(mut self) -> Self {
        self.mode = CompositeMode::Blend;
        self
    }

    pub fn with_max_granules(mut self, max: usize) -> Self {
        self.max_granules = Some(max);
        self
    }

    pub fn with_decoder(mut self, format_id: &str) -> Self {
        self.decoder_hint = Some(format_id.to_string());
        self
    }

    /// Reject requests that can't be answered whatever the mosaic holds.
    pub fn validate(&self) -> Result<(), String> {
        if !self.bbox.is_valid() {
            return Err(format!("bounding box {} is invalid", self.bbox));
        }
        if let Some(res) = &self.resolution {
            if !res.is_valid() {
                return Err(format!("resolution {:?} is not positive", res));
            }
        }
        if let Some(background) = &self.background {
            if background.is_empty() {
                return Err("background must have at least one value".to_string());
            }
        }
        if self.max_granules == Some(0) {
            return Err("max_granules must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_on_degenerate_axis() {
        let line = ReadRequest::new(BoundingBox::new(0.0, 0.0, 10.0, 0.0)).with_size(5, 1);
        assert_eq!(line.resolution, Some(ResolutionLevel::square(2.0)));

        let point = ReadRequest::new(BoundingBox::new(3.0, 3.0, 3.0, 3.0)).with_size(1, 1);
        assert_eq!(point.resolution, None);
        assert!(point.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(ReadRequest::new(BoundingBox::new(1.0, 0.0, 0.0, 1.0))
            .validate()
            .is_err());
        assert!(ReadRequest::new(bbox).with_resolution(0.0, 1.0).validate().is_err());
        assert!(ReadRequest::new(bbox).with_background(vec![]).validate().is_err());
        assert!(ReadRequest::new(bbox).with_max_granules(0).validate().is_err());
        assert!(ReadRequest::new(bbox).blended().validate().is_ok());
    }
}
