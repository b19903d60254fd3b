//! Terrain derivatives computed with Horn's 3×3 gradient.
//!
//! Only interior cells are analyzed: the one-cell border of every output grid
//! is nodata, and so is any cell whose 3×3 window touches nodata, NaN or an
//! infinity. Missing data never aborts a computation.

pub mod aspect;
mod gradient;
pub mod hillshade;
pub mod slope;

pub use aspect::aspect;
pub use hillshade::hillshade;
pub use slope::slope;

#[cfg(feature = "threading")]
use rayon::prelude::*;
use serde::Serialize;

use crate::color::ColorScheme;
use crate::error::{Result, TerrainError};
use crate::grid::{ElevationGrid, Extent, Raster};
use crate::params::SlopeUnit;
use gradient::Window;

/// Aspect value of cells with zero gradient.
pub const FLAT_ASPECT: f32 = -1.0;

/// Value of derivative cells that carry no result. Compare with
/// [`DerivativeGrid::value`], not `==`.
pub const DERIVATIVE_NODATA: f32 = f32::NAN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivativeKind {
    Hillshade,
    Slope(SlopeUnit),
    Aspect,
}

/// A raster derived from an [`ElevationGrid`]: same dimensions and extent.
#[derive(Debug, Clone, Serialize)]
pub struct DerivativeGrid {
    kind: DerivativeKind,
    data: Vec<f32>,
    width: usize,
    height: usize,
    extent: Extent,
    scheme: ColorScheme,
    bounds: Option<(f32, f32)>,
}

impl DerivativeGrid {
    pub fn kind(&self) -> DerivativeKind {
        self.kind
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    pub fn scheme(&self) -> ColorScheme {
        self.scheme
    }

    /// Explicit normalization bounds: `(0, 255)` for hillshade, the observed
    /// range for slope, none for aspect.
    pub fn bounds(&self) -> Option<(f32, f32)> {
        self.bounds
    }

    /// Replace the color scheme tag, e.g. to shade slope in grayscale.
    pub fn with_scheme(mut self, scheme: ColorScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Override normalization bounds, e.g. to pin slope to 0–90°.
    pub fn with_bounds(mut self, bounds: Option<(f32, f32)>) -> Self {
        self.bounds = bounds;
        self
    }
}

impl Raster for DerivativeGrid {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn extent(&self) -> &Extent {
        &self.extent
    }

    fn value(&self, row: usize, col: usize) -> Option<f32> {
        let v = self.get(row, col);
        if !v.is_finite() || (self.kind == DerivativeKind::Aspect && v == FLAT_ASPECT) {
            None
        } else {
            Some(v)
        }
    }

    fn normalization(&self) -> Option<(f32, f32)> {
        self.bounds
    }
}

fn require_window(grid: &ElevationGrid) -> Result<()> {
    if grid.width() < 3 || grid.height() < 3 {
        return Err(TerrainError::precondition(format!(
            "derivatives need at least a 3×3 grid, got {}×{}",
            grid.width(),
            grid.height()
        )));
    }
    Ok(())
}

fn require_z_factor(z_factor: f64) -> Result<()> {
    if !z_factor.is_finite() || z_factor <= 0.0 {
        return Err(TerrainError::precondition(format!(
            "z-factor must be a positive number, got {z_factor}"
        )));
    }
    Ok(())
}

/// Evaluate `cell` on every interior window. Border cells and windows touching
/// nodata stay [`DERIVATIVE_NODATA`]. Rows are independent, so they run in
/// parallel under the `threading` feature.
fn map_interior<F>(grid: &ElevationGrid, cell: F) -> Vec<f32>
where
    F: Fn(&Window) -> f32 + Sync,
{
    let (w, h) = (grid.width(), grid.height());
    let mut out = vec![DERIVATIVE_NODATA; w * h];

    let fill_row = |r: usize, row: &mut [f32]| {
        if r == 0 || r == h - 1 {
            return;
        }
        for c in 1..w - 1 {
            if let Some(window) = Window::at(grid, r, c) {
                row[c] = cell(&window);
            }
        }
    };

    #[cfg(feature = "threading")]
    out.par_chunks_mut(w).enumerate().for_each(|(r, row)| fill_row(r, row));
    #[cfg(not(feature = "threading"))]
    out.chunks_mut(w).enumerate().for_each(|(r, row)| fill_row(r, row));

    out
}

fn finite_range(data: &[f32]) -> Option<(f32, f32)> {
    data.iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn derived(
    grid: &ElevationGrid,
    kind: DerivativeKind,
    data: Vec<f32>,
    scheme: ColorScheme,
    bounds: Option<(f32, f32)>,
) -> DerivativeGrid {
    DerivativeGrid {
        kind,
        data,
        width: grid.width(),
        height: grid.height(),
        extent: *grid.extent(),
        scheme,
        bounds,
    }
}
