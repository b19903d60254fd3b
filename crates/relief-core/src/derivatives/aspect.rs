//! Slope aspect as a compass bearing.
//!
//! `angle = atan2(dz_dy, −dz_dx) · 180/π` is measured counter-clockwise from
//! east; it is folded into a bearing clockwise from north in [0°, 360°):
//!
//! ```text
//!   angle < 0   → 90 − angle
//!   angle > 90  → 450 − angle
//!   otherwise   → 90 − angle
//! ```
//!
//! Cells with zero gradient get [`FLAT_ASPECT`] and are never colored.

use super::{derived, map_interior, require_window, DerivativeGrid, DerivativeKind, FLAT_ASPECT};
use crate::color::ColorScheme;
use crate::error::Result;
use crate::grid::{ElevationGrid, Raster};

pub fn aspect(grid: &ElevationGrid) -> Result<DerivativeGrid> {
    require_window(grid)?;

    let (cell_x, cell_y) = grid.cell_size();
    let data = map_interior(grid, |window| {
        let (dz_dx, dz_dy) = window.horn(cell_x, cell_y, 1.0);
        if dz_dx == 0.0 && dz_dy == 0.0 {
            return FLAT_ASPECT;
        }
        compass_bearing(dz_dy.atan2(-dz_dx).to_degrees()) as f32
    });

    Ok(derived(grid, DerivativeKind::Aspect, data, ColorScheme::Circular, None))
}

fn compass_bearing(angle: f64) -> f64 {
    let bearing = if angle < 0.0 {
        90.0 - angle
    } else if angle > 90.0 {
        450.0 - angle
    } else {
        90.0 - angle
    };
    // Guard the open upper end against rounding.
    if bearing >= 360.0 {
        bearing - 360.0
    } else {
        bearing
    }
}
