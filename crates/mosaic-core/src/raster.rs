//! In-memory raster tiles and their pixel layout.
//!
//! Samples are held as `f64` in pixel-interleaved order regardless of the
//! declared [`SampleType`]; the type only drives no-data defaults, value
//! ranges and rounding when values are synthesized (blending, conversion).

use mosaic_common::PixelBounds;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Storage type of a band's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    U8,
    U16,
    I16,
    I32,
    F32,
    F64,
}

impl SampleType {
    pub fn is_floating(&self) -> bool {
        matches!(self, SampleType::F32 | SampleType::F64)
    }

    /// Value representing "no coverage": NaN for floats, the minimum for
    /// signed integers, zero for unsigned.
    pub fn default_no_data(&self) -> f64 {
        match self {
            SampleType::U8 | SampleType::U16 => 0.0,
            SampleType::I16 => i16::MIN as f64,
            SampleType::I32 => i32::MIN as f64,
            SampleType::F32 | SampleType::F64 => f64::NAN,
        }
    }

    /// Representable value range.
    pub fn range(&self) -> (f64, f64) {
        match self {
            SampleType::U8 => (0.0, u8::MAX as f64),
            SampleType::U16 => (0.0, u16::MAX as f64),
            SampleType::I16 => (i16::MIN as f64, i16::MAX as f64),
            SampleType::I32 => (i32::MIN as f64, i32::MAX as f64),
            SampleType::F32 => (f32::MIN as f64, f32::MAX as f64),
            SampleType::F64 => (f64::MIN, f64::MAX),
        }
    }

    /// Bring a computed value into this type: integers are rounded and
    /// clamped, floats pass through.
    pub fn conform(&self, value: f64) -> f64 {
        if self.is_floating() || value.is_nan() {
            return value;
        }
        let (lo, hi) = self.range();
        value.round().clamp(lo, hi)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SampleType::U8 => "uint8",
            SampleType::U16 => "uint16",
            SampleType::I16 => "int16",
            SampleType::I32 => "int32",
            SampleType::F32 => "float32",
            SampleType::F64 => "float64",
        }
    }
}

impl std::fmt::Display for SampleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// RGBA color lookup table for index-color rasters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub entries: Vec<[u8; 4]>,
}

impl Palette {
    pub fn new(entries: Vec<[u8; 4]>) -> Self {
        Self { entries }
    }

    /// Color for an index; out-of-table indices map to transparent black.
    pub fn lookup(&self, index: f64) -> [u8; 4] {
        if index.is_nan() || index < 0.0 {
            return [0, 0, 0, 0];
        }
        self.entries
            .get(index as usize)
            .copied()
            .unwrap_or([0, 0, 0, 0])
    }
}

/// How band values map to color.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorModel {
    /// Each band is a component (gray, RGB, RGBA or arbitrary data bands).
    Component,
    /// Single band of palette indices.
    Indexed(Arc<Palette>),
}

impl ColorModel {
    pub fn palette(&self) -> Option<&Arc<Palette>> {
        match self {
            ColorModel::Indexed(p) => Some(p),
            ColorModel::Component => None,
        }
    }
}

/// Per-band color meaning reported with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorInterpretation {
    Gray,
    Red,
    Green,
    Blue,
    Alpha,
    Palette,
    Undefined,
}

impl ColorInterpretation {
    /// Interpretation of every band of a layout.
    pub fn for_layout(layout: &PixelLayout) -> Vec<ColorInterpretation> {
        use ColorInterpretation as C;
        match (&layout.color_model, layout.bands) {
            (ColorModel::Indexed(_), _) => vec![C::Palette],
            (ColorModel::Component, 1) => vec![C::Gray],
            (ColorModel::Component, 2) => vec![C::Gray, C::Alpha],
            (ColorModel::Component, 3) => vec![C::Red, C::Green, C::Blue],
            (ColorModel::Component, 4) => vec![C::Red, C::Green, C::Blue, C::Alpha],
            (ColorModel::Component, n) => vec![C::Undefined; n],
        }
    }
}

/// Pixel format shared by all tiles of one composite.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelLayout {
    pub sample_type: SampleType,
    pub bands: usize,
    pub color_model: ColorModel,
}

impl PixelLayout {
    pub fn component(sample_type: SampleType, bands: usize) -> Self {
        Self {
            sample_type,
            bands,
            color_model: ColorModel::Component,
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self.color_model, ColorModel::Indexed(_))
    }
}

/// A rectangular block of pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub layout: PixelLayout,
    /// Pixel-interleaved samples, `width * height * bands` long.
    pub data: Vec<f64>,
}

impl Raster {
    /// Raster with every pixel set to `values` (one per band).
    pub fn filled(width: usize, height: usize, layout: PixelLayout, values: &[f64]) -> Self {
        let bands = layout.bands;
        let mut data = Vec::with_capacity(width * height * bands);
        for _ in 0..width * height {
            for band in 0..bands {
                data.push(values.get(band).copied().unwrap_or(f64::NAN));
            }
        }
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    /// Build from raw samples. Returns `None` if the length does not match.
    pub fn from_data(
        width: usize,
        height: usize,
        layout: PixelLayout,
        data: Vec<f64>,
    ) -> Option<Self> {
        if data.len() != width * height * layout.bands {
            return None;
        }
        Some(Self {
            width,
            height,
            layout,
            data,
        })
    }

    pub fn bands(&self) -> usize {
        self.layout.bands
    }

    fn offset(&self, col: usize, row: usize) -> usize {
        (row * self.width + col) * self.layout.bands
    }

    /// All band values of one pixel.
    pub fn pixel(&self, col: usize, row: usize) -> &[f64] {
        let start = self.offset(col, row);
        &self.data[start..start + self.layout.bands]
    }

    pub fn pixel_mut(&mut self, col: usize, row: usize) -> &mut [f64] {
        let start = self.offset(col, row);
        let bands = self.layout.bands;
        &mut self.data[start..start + bands]
    }

    pub fn get(&self, col: usize, row: usize, band: usize) -> f64 {
        self.data[self.offset(col, row) + band]
    }

    /// Copy out a sub-rectangle, `None` if it is not fully inside.
    pub fn crop(&self, region: &PixelBounds) -> Option<Raster> {
        if region.x < 0
            || region.y < 0
            || region.max_x() > self.width as i64
            || region.max_y() > self.height as i64
        {
            return None;
        }
        let (x0, y0) = (region.x as usize, region.y as usize);
        let mut data = Vec::with_capacity(region.area() * self.layout.bands);
        for row in y0..y0 + region.height {
            let start = self.offset(x0, row);
            let end = start + region.width * self.layout.bands;
            data.extend_from_slice(&self.data[start..end]);
        }
        Some(Raster {
            width: region.width,
            height: region.height,
            layout: self.layout.clone(),
            data,
        })
    }
}

/// Single-band 8-bit coverage mask; 0 is fully transparent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaMask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl AlphaMask {
    pub fn opaque(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![u8::MAX; width * height],
        }
    }

    pub fn get(&self, col: usize, row: usize) -> u8 {
        self.data[row * self.width + col]
    }

    pub fn set(&mut self, col: usize, row: usize, value: u8) {
        self.data[row * self.width + col] = value;
    }
}
