//! Slope steepness (Horn method).
//!
//! `magnitude = √(dz_dx² + dz_dy²)`; degrees = `atan(magnitude) · 180/π`,
//! percent = `magnitude · 100`. The observed min/max over valid cells becomes
//! the grid's normalization bounds.

use log::debug;

use super::{
    derived, finite_range, map_interior, require_window, require_z_factor, DerivativeGrid,
    DerivativeKind,
};
use crate::color::{ColorScheme, RampPreset};
use crate::error::Result;
use crate::grid::{ElevationGrid, Raster};
use crate::params::{SlopeParams, SlopeUnit};

pub fn slope(grid: &ElevationGrid, params: &SlopeParams) -> Result<DerivativeGrid> {
    require_window(grid)?;
    require_z_factor(params.z_factor)?;

    let (cell_x, cell_y) = grid.cell_size();
    let unit = params.unit;
    let data = map_interior(grid, |window| {
        let (dz_dx, dz_dy) = window.horn(cell_x, cell_y, params.z_factor);
        let magnitude = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt();
        let v = match unit {
            SlopeUnit::Degrees => magnitude.atan().to_degrees(),
            SlopeUnit::Percent => magnitude * 100.0,
        };
        v as f32
    });

    let observed = finite_range(&data);
    debug!("slope {}×{} ({unit:?}) observed range {observed:?}", grid.width(), grid.height());

    Ok(derived(
        grid,
        DerivativeKind::Slope(unit),
        data,
        ColorScheme::Ramp(RampPreset::Slope),
        observed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivatives::test_grids::{flat, unit_grid};
    use approx::assert_abs_diff_eq;

    /// Planar ramp rising east at `deg` degrees over unit cells.
    fn ramp(n: usize, deg: f64) -> ElevationGrid {
        let rise = deg.to_radians().tan();
        unit_grid(n, |_, c| (c as f64 * rise) as f32)
    }

    #[test]
    fn flat_grid_has_zero_slope_for_any_z_factor() {
        for z_factor in [0.1, 1.0, 3.5] {
            let params = SlopeParams { z_factor, ..SlopeParams::default() };
            let out = slope(&flat(9, 250.0), &params).unwrap();
            for r in 1..8 {
                for c in 1..8 {
                    assert_eq!(out.value(r, c), Some(0.0));
                }
            }
            assert_eq!(out.bounds(), Some((0.0, 0.0)));
        }
    }

    #[test]
    fn planar_ramp_in_degrees() {
        let out = slope(&ramp(16, 30.0), &SlopeParams::default()).unwrap();
        for r in 1..15 {
            for c in 1..15 {
                assert_abs_diff_eq!(out.get(r, c), 30.0, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn planar_ramp_in_percent() {
        let params = SlopeParams { unit: SlopeUnit::Percent, z_factor: 1.0 };
        let out = slope(&ramp(8, 45.0), &params).unwrap();
        assert_abs_diff_eq!(out.get(3, 3), 100.0, epsilon = 1e-3);
        assert_eq!(out.kind(), DerivativeKind::Slope(SlopeUnit::Percent));
    }

    #[test]
    fn tracks_observed_bounds() {
        // Gentle west half, steeper east half.
        let g = unit_grid(10, |_, c| if c < 5 { c as f32 } else { 5.0 + (c as f32 - 5.0) * 3.0 });
        let out = slope(&g, &SlopeParams { unit: SlopeUnit::Percent, z_factor: 1.0 }).unwrap();
        let (lo, hi) = out.bounds().unwrap();
        assert_abs_diff_eq!(lo, 100.0, epsilon = 1e-3);
        assert_abs_diff_eq!(hi, 300.0, epsilon = 1e-3);
    }

    #[test]
    fn rejects_non_positive_z_factor() {
        let params = SlopeParams { z_factor: 0.0, ..SlopeParams::default() };
        assert!(slope(&flat(4, 1.0), &params).is_err());
    }
}
