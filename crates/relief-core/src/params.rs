//! Analysis parameters. Every struct deserializes with `#[serde(default)]`, so
//! a partial JSON document only overrides the fields it names.

use serde::{Deserialize, Serialize};

use crate::color::RampPreset;
use crate::crs::Crs;

/// Sun position and vertical exaggeration for hillshading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HillshadeParams {
    /// Sun azimuth, degrees clockwise from north. Default 315 (north-west).
    pub azimuth: f64,
    /// Sun altitude above the horizon, degrees. Default 45.
    pub altitude: f64,
    pub z_factor: f64,
}

impl Default for HillshadeParams {
    fn default() -> Self {
        Self { azimuth: 315.0, altitude: 45.0, z_factor: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeUnit {
    #[default]
    Degrees,
    Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlopeParams {
    pub unit: SlopeUnit,
    pub z_factor: f64,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self { unit: SlopeUnit::Degrees, z_factor: 1.0 }
    }
}

/// Contour spacing and optional elevation window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourParams {
    pub interval: f64,
    /// Lowest elevation considered; defaults to the grid minimum.
    pub min_elevation: Option<f64>,
    /// Highest elevation considered; defaults to the grid maximum.
    pub max_elevation: Option<f64>,
}

impl Default for ContourParams {
    fn default() -> Self {
        Self { interval: 10.0, min_elevation: None, max_elevation: None }
    }
}

/// Per-frame rendering budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Upper bound on pixels evaluated per frame; larger requests are
    /// computed at reduced resolution and upscaled.
    pub max_pixels: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { max_pixels: 2048 * 2048 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    /// CRS the grid extent is reprojected into. Default Web Mercator.
    pub display_crs: Crs,
    /// Overrides the nodata value declared by the source.
    pub nodata: Option<f32>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self { display_crs: Crs::WebMercator, nodata: None }
    }
}

/// Everything a front end needs to run the full analysis suite.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub ingest: IngestOptions,
    pub hillshade: HillshadeParams,
    pub slope: SlopeParams,
    pub contours: ContourParams,
    pub render: RenderOptions,
    /// Ramp used when rendering raw elevation.
    pub elevation_ramp: RampPreset,
}
