//! Overview (resolution level) selection.
//!
//! A pure function of the requested resolution, the policy and the levels
//! the mosaic was opened with. Level 0 is native resolution and levels get
//! coarser with their index.

use serde::{Deserialize, Serialize};

/// Relative tolerance when comparing resolutions, so that a request for
/// exactly a level's resolution matches that level despite float noise.
const RESOLUTION_TOLERANCE: f64 = 1e-9;

/// Strategy for picking a resolution level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverviewPolicy {
    /// Always read native resolution.
    Ignore,
    /// Level closest to the request by ratio.
    Nearest,
    /// Closest level that is not coarser than the request.
    Quality,
    /// Closest level that is not finer than the request.
    Speed,
}

impl Default for OverviewPolicy {
    fn default() -> Self {
        Self::Nearest
    }
}

impl OverviewPolicy {
    /// Parse from string (case-insensitive). Unknown values fall back to
    /// the default.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "ignore" => Self::Ignore,
            "nearest" => Self::Nearest,
            "quality" => Self::Quality,
            "speed" => Self::Speed,
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Nearest => "nearest",
            Self::Quality => "quality",
            Self::Speed => "speed",
        }
    }

    pub fn all() -> [OverviewPolicy; 4] {
        [Self::Ignore, Self::Nearest, Self::Quality, Self::Speed]
    }
}

impl std::fmt::Display for OverviewPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ground units per pixel along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionLevel {
    pub x: f64,
    pub y: f64,
}

impl ResolutionLevel {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn square(res: f64) -> Self {
        Self { x: res, y: res }
    }

    /// Single figure used to rank levels: the finer axis.
    pub fn scalar(&self) -> f64 {
        self.x.min(self.y)
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.x > 0.0 && self.y > 0.0
    }
}

/// Outcome of [`select_level`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSelection {
    pub level: usize,
    pub subsampling_x: u32,
    pub subsampling_y: u32,
}

impl LevelSelection {
    pub fn native() -> Self {
        Self {
            level: 0,
            subsampling_x: 1,
            subsampling_y: 1,
        }
    }
}

/// Pick a level and the extra integer subsampling for a request.
pub fn select_level(
    requested: ResolutionLevel,
    policy: OverviewPolicy,
    levels: &[ResolutionLevel],
) -> LevelSelection {
    if levels.is_empty() || policy == OverviewPolicy::Ignore || !requested.is_valid() {
        return LevelSelection::native();
    }

    let level = match policy {
        OverviewPolicy::Ignore => 0,
        OverviewPolicy::Nearest => nearest_level(requested.scalar(), levels),
        OverviewPolicy::Quality => quality_level(requested.scalar(), levels),
        OverviewPolicy::Speed => speed_level(requested.scalar(), levels),
    };

    let chosen = levels[level];
    LevelSelection {
        level,
        subsampling_x: subsampling(requested.x, chosen.x),
        subsampling_y: subsampling(requested.y, chosen.y),
    }
}

fn nearest_level(requested: f64, levels: &[ResolutionLevel]) -> usize {
    let mut best = 0;
    let mut best_ratio = f64::INFINITY;
    for (index, level) in levels.iter().enumerate() {
        let res = level.scalar();
        let ratio = (res / requested).max(requested / res);
        // `<=` with tolerance: on a tie the later (coarser) level wins.
        if ratio <= best_ratio * (1.0 + RESOLUTION_TOLERANCE) {
            best = index;
            best_ratio = ratio.min(best_ratio);
        }
    }
    best
}

fn quality_level(requested: f64, levels: &[ResolutionLevel]) -> usize {
    let limit = requested * (1.0 + RESOLUTION_TOLERANCE);
    levels
        .iter()
        .rposition(|level| level.scalar() <= limit)
        .unwrap_or(0)
}

fn speed_level(requested: f64, levels: &[ResolutionLevel]) -> usize {
    let limit = requested * (1.0 - RESOLUTION_TOLERANCE);
    levels
        .iter()
        .position(|level| level.scalar() >= limit)
        .unwrap_or(levels.len() - 1)
}

fn subsampling(requested: f64, level: f64) -> u32 {
    let factor = (requested / level * (1.0 + RESOLUTION_TOLERANCE)).floor();
    if factor.is_finite() && factor >= 1.0 {
        factor.min(u32::MAX as f64) as u32
    } else {
        1
    }
}
