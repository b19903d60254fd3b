//! Analytical hillshade.
//!
//! ```text
//!   slope       = atan(√(dz_dx² + dz_dy²))
//!   aspect      = atan2(dz_dy, −dz_dx)
//!   azimuth_rad = (360 − azimuth + 90) · π/180
//!   altitude_rad = altitude · π/180
//!   shade = sin(alt)·cos(slope) + cos(alt)·sin(slope)·cos(azimuth_rad − aspect)
//! ```
//! `shade` is clamped to [0, 1] and scaled to [0, 255].

use log::debug;

use super::{derived, map_interior, require_window, require_z_factor, DerivativeGrid, DerivativeKind};
use crate::color::{ColorScheme, RampPreset};
use crate::error::Result;
use crate::grid::{ElevationGrid, Raster};
use crate::params::HillshadeParams;

pub fn hillshade(grid: &ElevationGrid, params: &HillshadeParams) -> Result<DerivativeGrid> {
    require_window(grid)?;
    require_z_factor(params.z_factor)?;

    let (cell_x, cell_y) = grid.cell_size();
    let azimuth_rad = (360.0 - params.azimuth + 90.0).to_radians();
    let altitude_rad = params.altitude.to_radians();
    let (sin_alt, cos_alt) = altitude_rad.sin_cos();
    debug!(
        "hillshade {}×{} azimuth={} altitude={} z_factor={}",
        grid.width(),
        grid.height(),
        params.azimuth,
        params.altitude,
        params.z_factor
    );

    let data = map_interior(grid, |window| {
        let (dz_dx, dz_dy) = window.horn(cell_x, cell_y, params.z_factor);
        let slope = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan();
        let aspect = dz_dy.atan2(-dz_dx);
        let shade =
            sin_alt * slope.cos() + cos_alt * slope.sin() * (azimuth_rad - aspect).cos();
        (shade.clamp(0.0, 1.0) * 255.0) as f32
    });

    Ok(derived(
        grid,
        DerivativeKind::Hillshade,
        data,
        ColorScheme::Ramp(RampPreset::Grayscale),
        Some((0.0, 255.0)),
    ))
}
