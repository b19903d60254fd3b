//! Horn (1981) 3×3 gradient shared by hillshade, slope and aspect.

use crate::grid::ElevationGrid;

/// The 3×3 neighbourhood around an interior cell, row-major:
/// ```text
///   z0 NW   z1 N   z2 NE
///   z3 W    z4 *   z5 E
///   z6 SW   z7 S   z8 SE
/// ```
/// Row 0 is north, so `z6..z8` lie south of the centre.
pub(crate) struct Window {
    z: [f64; 9],
}

impl Window {
    /// Gather the window centred on `(r, c)`, or `None` when any of the nine
    /// cells is nodata, NaN or infinite.
    ///
    /// Caller must ensure `1 ≤ r ≤ height−2` and `1 ≤ c ≤ width−2`.
    pub(crate) fn at(grid: &ElevationGrid, r: usize, c: usize) -> Option<Self> {
        let mut z = [0.0f64; 9];
        for dr in 0..3 {
            for dc in 0..3 {
                let v = grid.get(r + dr - 1, c + dc - 1);
                if grid.is_nodata(v) {
                    return None;
                }
                z[dr * 3 + dc] = v as f64;
            }
        }
        Some(Self { z })
    }

    /// Horn gradient `(dz/dx, dz/dy)`:
    ///
    /// `dz/dx = ((z2 + 2·z5 + z8) − (z0 + 2·z3 + z6)) / (8 · cell_x · z_factor)`
    /// `dz/dy = ((z6 + 2·z7 + z8) − (z0 + 2·z1 + z2)) / (8 · cell_y · z_factor)`
    ///
    /// `dz/dy` is positive when terrain rises towards the south.
    pub(crate) fn horn(&self, cell_x: f64, cell_y: f64, z_factor: f64) -> (f64, f64) {
        let z = &self.z;
        let dz_dx = ((z[2] + 2.0 * z[5] + z[8]) - (z[0] + 2.0 * z[3] + z[6]))
            / (8.0 * cell_x * z_factor);
        let dz_dy = ((z[6] + 2.0 * z[7] + z[8]) - (z[0] + 2.0 * z[1] + z[2]))
            / (8.0 * cell_y * z_factor);
        (dz_dx, dz_dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Extent, DEFAULT_NODATA};

    fn grid(f: impl Fn(usize, usize) -> f32) -> ElevationGrid {
        let extent = Extent::new(0.0, 0.0, 6.0, 3.0).unwrap();
        // 3×3 cells over 6×3 units: cell_x = 2, cell_y = 1.
        ElevationGrid::from_fn(3, 3, extent, DEFAULT_NODATA, f).unwrap()
    }

    #[test]
    fn eastward_rise_has_positive_dz_dx() {
        let g = grid(|_, c| c as f32 * 4.0);
        let (dx, dy) = Window::at(&g, 1, 1).unwrap().horn(2.0, 1.0, 1.0);
        assert_eq!(dx, 2.0);
        assert_eq!(dy, 0.0);
    }

    #[test]
    fn southward_rise_has_positive_dz_dy() {
        let g = grid(|r, _| r as f32 * 3.0);
        let (dx, dy) = Window::at(&g, 1, 1).unwrap().horn(2.0, 1.0, 1.0);
        assert_eq!(dx, 0.0);
        assert_eq!(dy, 3.0);
    }

    #[test]
    fn z_factor_divides_the_gradient() {
        let g = grid(|_, c| c as f32 * 4.0);
        let (dx, _) = Window::at(&g, 1, 1).unwrap().horn(2.0, 1.0, 2.0);
        assert_eq!(dx, 1.0);
    }

    #[test]
    fn any_nodata_cell_voids_the_window() {
        let g = grid(|r, c| if (r, c) == (2, 0) { DEFAULT_NODATA } else { 1.0 });
        assert!(Window::at(&g, 1, 1).is_none());
        let g = grid(|r, c| if (r, c) == (0, 2) { f32::NAN } else { 1.0 });
        assert!(Window::at(&g, 1, 1).is_none());
    }
}
