//! Scalar → RGB mapping.
//!
//! Ramps are always passed explicitly; there is no process-wide "current"
//! ramp, so concurrent analyses can use different styles.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TerrainError};

pub type Rgb = [u8; 3];

/// Piecewise-linear color ramp over [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRamp {
    stops: Vec<(f32, Rgb)>,
}

impl ColorRamp {
    /// Stops must lie in [0, 1] and strictly increase.
    pub fn new(stops: Vec<(f32, Rgb)>) -> Result<Self> {
        if stops.is_empty() {
            return Err(TerrainError::precondition("color ramp needs at least one stop"));
        }
        if let Some((s, _)) = stops.iter().find(|(s, _)| !(0.0..=1.0).contains(s)) {
            return Err(TerrainError::precondition(format!("ramp stop {s} outside [0, 1]")));
        }
        if let Some(w) = stops.windows(2).find(|w| w[1].0 <= w[0].0) {
            return Err(TerrainError::precondition(format!(
                "ramp stops must increase, got {} then {}",
                w[0].0, w[1].0
            )));
        }
        Ok(Self { stops })
    }

    pub fn stops(&self) -> &[(f32, Rgb)] {
        &self.stops
    }

    /// Color for a normalized value. Values outside the stop range clamp to
    /// the nearest end color; NaN has no color.
    pub fn map(&self, v: f32) -> Option<Rgb> {
        if v.is_nan() {
            return None;
        }
        let (first, last) = (self.stops[0], self.stops[self.stops.len() - 1]);
        if v <= first.0 {
            return Some(first.1);
        }
        if v >= last.0 {
            return Some(last.1);
        }
        self.stops
            .windows(2)
            .find(|w| w[0].0 <= v && v <= w[1].0)
            .map(|w| {
                let (s0, c0) = w[0];
                let (s1, c1) = w[1];
                let t = (v - s0) / (s1 - s0);
                [lerp(c0[0], c1[0], t), lerp(c0[1], c1[1], t), lerp(c0[2], c1[2], t)]
            })
    }
}

#[inline]
fn lerp(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8
}

/// Built-in ramps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampPreset {
    /// Hypsometric tint: lowland green, upland tan and brown, snow white.
    #[default]
    Terrain,
    Grayscale,
    /// Gentle green through yellow to steep red.
    Slope,
}

impl RampPreset {
    pub fn ramp(self) -> ColorRamp {
        let stops = match self {
            RampPreset::Terrain => vec![
                (0.00, [42, 110, 58]),
                (0.25, [120, 170, 80]),
                (0.50, [222, 200, 130]),
                (0.75, [150, 110, 70]),
                (1.00, [255, 255, 255]),
            ],
            RampPreset::Grayscale => vec![(0.0, [0, 0, 0]), (1.0, [255, 255, 255])],
            RampPreset::Slope => vec![
                (0.0, [26, 150, 65]),
                (0.5, [255, 255, 191]),
                (1.0, [215, 25, 28]),
            ],
        };
        ColorRamp { stops }
    }
}

/// Style tag carried by derivative grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorScheme {
    Ramp(RampPreset),
    /// Compass bearings mapped around the hue wheel.
    Circular,
}

impl ColorScheme {
    pub fn mapping(self) -> ColorMapping {
        match self {
            ColorScheme::Ramp(preset) => ColorMapping::Ramp(preset.ramp()),
            ColorScheme::Circular => ColorMapping::Circular,
        }
    }
}

/// How a raw cell value becomes a color.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorMapping {
    /// Normalize against `(min, max)` bounds, then look up the ramp.
    Ramp(ColorRamp),
    /// Treat values as bearings in degrees; negative values are uncolored.
    Circular,
}

impl ColorMapping {
    pub fn color(&self, value: f32, bounds: Option<(f32, f32)>) -> Option<Rgb> {
        match self {
            ColorMapping::Ramp(ramp) => {
                let (lo, hi) = bounds.unwrap_or((0.0, 1.0));
                ramp.map(normalize(value, lo, hi))
            }
            ColorMapping::Circular => (value >= 0.0).then(|| aspect_color(value)),
        }
    }
}

/// `(v − lo) / (hi − lo)`; a degenerate range normalizes to 0.
#[inline]
pub fn normalize(v: f32, lo: f32, hi: f32) -> f32 {
    if hi > lo {
        (v - lo) / (hi - lo)
    } else {
        0.0
    }
}

/// Bearing in degrees → HSL(bearing, 70 %, 50 %).
pub fn aspect_color(angle: f32) -> Rgb {
    hsl_to_rgb(angle, 0.7, 0.5)
}

/// Hue in degrees (wrapped), saturation and lightness in [0, 1].
pub fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> Rgb {
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let m = lightness - c / 2.0;
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let to_u8 = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_u8(r), to_u8(g), to_u8(b)]
}
