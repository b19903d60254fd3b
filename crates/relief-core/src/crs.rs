//! Coordinate reference systems and bounding-box reprojection.
//!
//! Only the grid's bounding box is reprojected; cells keep their row/column
//! layout and are spread linearly over the transformed extent.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Result, TerrainError};
use crate::grid::Extent;

/// WGS84 semi-major axis, the sphere radius of Web Mercator (metres).
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Latitude at which Web Mercator becomes square (degrees).
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// GeoTIFF code for "user-defined", treated as ambiguous.
const USER_DEFINED: u32 = 32_767;

/// A CRS identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Crs {
    /// Geographic WGS84, EPSG:4326.
    Wgs84,
    /// Spherical ("Web") Mercator, EPSG:3857.
    WebMercator,
    /// Any other EPSG code.
    Epsg(u32),
}

impl Crs {
    /// Map an EPSG code to a CRS. `None` for codes that carry no identity
    /// (0 and the GeoTIFF user-defined sentinel).
    pub fn from_epsg(code: u32) -> Option<Self> {
        match code {
            0 | USER_DEFINED => None,
            4326 => Some(Crs::Wgs84),
            3857 | 900_913 => Some(Crs::WebMercator),
            other => Some(Crs::Epsg(other)),
        }
    }

    pub fn epsg(self) -> u32 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::WebMercator => 3857,
            Crs::Epsg(code) => code,
        }
    }

    pub fn is_geographic(self) -> bool {
        self == Crs::Wgs84
    }
}

impl Default for Crs {
    fn default() -> Self {
        Crs::WebMercator
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Failure of a single transform attempt. Only exhaustion of the whole
/// fallback chain is reported to callers, as [`TerrainError::Projection`].
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransformError(pub String);

/// The reprojection function the ingestion pipeline consumes.
pub trait Reprojector {
    fn transform_point(&self, x: f64, y: f64, from: Crs, to: Crs)
        -> std::result::Result<(f64, f64), TransformError>;

    /// Transform a bounding box by its four corners.
    fn transform_extent(
        &self,
        extent: &Extent,
        from: Crs,
        to: Crs,
    ) -> std::result::Result<Extent, TransformError> {
        let corners = [
            (extent.min_x, extent.min_y),
            (extent.min_x, extent.max_y),
            (extent.max_x, extent.min_y),
            (extent.max_x, extent.max_y),
        ];
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for (x, y) in corners {
            let (tx, ty) = self.transform_point(x, y, from, to)?;
            min_x = min_x.min(tx);
            min_y = min_y.min(ty);
            max_x = max_x.max(tx);
            max_y = max_y.max(ty);
        }
        Extent::new(min_x, min_y, max_x, max_y).map_err(|e| TransformError(e.to_string()))
    }
}

/// Built-in transform between WGS84 and Web Mercator. Any other pair fails,
/// leaving the decision to the fallback chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct SphericalMercator;

impl Reprojector for SphericalMercator {
    fn transform_point(
        &self,
        x: f64,
        y: f64,
        from: Crs,
        to: Crs,
    ) -> std::result::Result<(f64, f64), TransformError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(TransformError(format!("non-finite coordinate ({x}, {y})")));
        }
        match (from, to) {
            (a, b) if a == b => Ok((x, y)),
            (Crs::Wgs84, Crs::WebMercator) => {
                if !(-180.0..=180.0).contains(&x) {
                    return Err(TransformError(format!("longitude {x} out of range")));
                }
                if y.abs() > MAX_MERCATOR_LAT {
                    return Err(TransformError(format!("latitude {y} outside Mercator range")));
                }
                Ok(lon_lat_to_mercator(x, y))
            }
            (Crs::WebMercator, Crs::Wgs84) => {
                let limit = EARTH_RADIUS_M * PI;
                if x.abs() > limit * (1.0 + 1e-9) || y.abs() > limit * (1.0 + 1e-9) {
                    return Err(TransformError(format!("({x}, {y}) outside Mercator plane")));
                }
                Ok(mercator_to_lon_lat(x, y))
            }
            (a, b) => Err(TransformError(format!("no transform from {a} to {b}"))),
        }
    }
}

/// Closed-form spherical Mercator forward projection (degrees → metres).
pub fn lon_lat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = EARTH_RADIUS_M * lon.to_radians();
    let y = EARTH_RADIUS_M * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

/// Inverse of [`lon_lat_to_mercator`].
pub fn mercator_to_lon_lat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS_M).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - FRAC_PI_2).to_degrees();
    (lon, lat)
}

/// Which step of the fallback chain produced a reprojected extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReprojectionTier {
    /// The declared source CRS transformed directly.
    Direct,
    /// The source CRS failed; the box was retransformed as WGS84.
    AssumedWgs84,
    /// Coordinates exceed lon/lat ranges and were kept as already projected.
    AlreadyProjected,
    /// The box was projected with the closed-form Mercator formula.
    ManualMercator,
}

impl ReprojectionTier {
    pub fn is_fallback(self) -> bool {
        self != ReprojectionTier::Direct
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reprojected {
    pub extent: Extent,
    pub tier: ReprojectionTier,
}

/// Reproject a bounding box with the three-tier fallback:
///
/// 1. direct transform from `source`;
/// 2. on failure, assume WGS84 and retransform;
/// 3. on failure, keep boxes whose magnitudes exceed lon/lat ranges as already
///    projected, otherwise apply the Mercator formula by hand.
///
/// Fails with [`TerrainError::Projection`] only when tier 3 cannot produce a
/// valid extent either.
pub fn reproject_extent(
    extent: &Extent,
    source: Crs,
    target: Crs,
    reprojector: &dyn Reprojector,
) -> Result<Reprojected> {
    let direct_err = match reprojector.transform_extent(extent, source, target) {
        Ok(extent) => {
            return Ok(Reprojected { extent, tier: ReprojectionTier::Direct });
        }
        Err(e) => e,
    };
    warn!("direct reprojection {source} -> {target} failed ({direct_err}), retrying as WGS84");

    if !source.is_geographic() {
        match reprojector.transform_extent(extent, Crs::Wgs84, target) {
            Ok(extent) => {
                return Ok(Reprojected { extent, tier: ReprojectionTier::AssumedWgs84 });
            }
            Err(e) => warn!("WGS84 reprojection -> {target} failed ({e})"),
        }
    }

    let projection_error = |reason: String| TerrainError::Projection {
        source_crs: source.to_string(),
        target_crs: target.to_string(),
        reason,
    };

    if exceeds_lon_lat(extent) {
        warn!("extent {extent:?} exceeds lon/lat ranges, keeping it as already projected");
        return Ok(Reprojected { extent: *extent, tier: ReprojectionTier::AlreadyProjected });
    }

    if target != Crs::WebMercator {
        return Err(projection_error(format!(
            "{direct_err}; manual fallback only targets {}",
            Crs::WebMercator
        )));
    }

    let clamp = |lat: f64| lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let (min_x, min_y) = lon_lat_to_mercator(extent.min_x, clamp(extent.min_y));
    let (max_x, max_y) = lon_lat_to_mercator(extent.max_x, clamp(extent.max_y));
    let projected = Extent::new(min_x, min_y, max_x, max_y)
        .map_err(|e| projection_error(format!("{direct_err}; manual Mercator: {e}")))?;
    warn!("projected extent with the closed-form Mercator formula");
    Ok(Reprojected { extent: projected, tier: ReprojectionTier::ManualMercator })
}

fn exceeds_lon_lat(extent: &Extent) -> bool {
    extent.min_x.abs() > 180.0
        || extent.max_x.abs() > 180.0
        || extent.min_y.abs() > 90.0
        || extent.max_y.abs() > 90.0
}
