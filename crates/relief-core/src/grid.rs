use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::error::{Result, TerrainError};

/// Default nodata sentinel when the source declares none.
pub const DEFAULT_NODATA: f32 = -9999.0;

/// Axis-aligned geographic bounding box. Always `min < max` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        let finite = [min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite());
        if !finite || min_x >= max_x || min_y >= max_y {
            return Err(TerrainError::precondition(format!(
                "invalid extent [{min_x}, {min_y}, {max_x}, {max_y}]"
            )));
        }
        Ok(Self { min_x, min_y, max_x, max_y })
    }

    #[inline]
    pub fn span_x(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn span_y(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Half-open containment: the max edges belong to the next extent over.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x < self.max_x && y > self.min_y && y <= self.max_y
    }
}

/// Read access shared by elevation and derivative grids, used by rendering.
///
/// Row 0 is the northern edge (`max_y`), column 0 the western edge (`min_x`).
pub trait Raster {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn extent(&self) -> &Extent;

    /// Value at `(row, col)`, or `None` for cells that must not be colored.
    fn value(&self, row: usize, col: usize) -> Option<f32>;

    /// Bounds used to normalize values into [0, 1] before color mapping.
    fn normalization(&self) -> Option<(f32, f32)>;

    /// Cell size `(x, y)` in extent units.
    fn cell_size(&self) -> (f64, f64) {
        let e = self.extent();
        (e.span_x() / self.width() as f64, e.span_y() / self.height() as f64)
    }
}

/// An immutable DEM: row-major `f32` elevations with a nodata sentinel.
///
/// The valid elevation range is scanned once at construction; NaN and
/// infinities count as nodata alongside the sentinel.
#[derive(Debug, Clone, Serialize)]
pub struct ElevationGrid {
    data: Vec<f32>,
    width: usize,
    height: usize,
    extent: Extent,
    nodata: f32,
    crs: Crs,
    range: Option<(f32, f32)>,
}

impl ElevationGrid {
    pub fn new(data: Vec<f32>, width: usize, height: usize, extent: Extent, nodata: f32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(TerrainError::precondition(format!(
                "grid dimensions must be non-zero, got {width}×{height}"
            )));
        }
        if data.len() != width * height {
            return Err(TerrainError::precondition(format!(
                "buffer holds {} cells, expected {width}×{height} = {}",
                data.len(),
                width * height
            )));
        }
        let range = scan_range(&data, nodata);
        Ok(Self { data, width, height, extent, nodata, crs: Crs::default(), range })
    }

    /// Build a grid by evaluating `f(row, col)` for every cell.
    pub fn from_fn(
        width: usize,
        height: usize,
        extent: Extent,
        nodata: f32,
        f: impl Fn(usize, usize) -> f32,
    ) -> Result<Self> {
        let mut data = Vec::with_capacity(width * height);
        for r in 0..height {
            for c in 0..width {
                data.push(f(r, c));
            }
        }
        Self::new(data, width, height, extent, nodata)
    }

    /// Tag the CRS the extent is expressed in.
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = crs;
        self
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn is_nodata(&self, v: f32) -> bool {
        v == self.nodata || !v.is_finite()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn nodata(&self) -> f32 {
        self.nodata
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// Observed `(min, max)` over valid cells; `None` when every cell is nodata.
    pub fn range(&self) -> Option<(f32, f32)> {
        self.range
    }

    pub fn min_elevation(&self) -> Option<f32> {
        self.range.map(|(lo, _)| lo)
    }

    pub fn max_elevation(&self) -> Option<f32> {
        self.range.map(|(_, hi)| hi)
    }
}

impl Raster for ElevationGrid {
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
        (!self.is_nodata(v)).then_some(v)
    }

    fn normalization(&self) -> Option<(f32, f32)> {
        self.range
    }
}

fn scan_range(data: &[f32], nodata: f32) -> Option<(f32, f32)> {
    data.iter()
        .copied()
        .filter(|&v| v != nodata && v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_extent() -> Extent {
        Extent::new(0.0, 0.0, 4.0, 4.0).unwrap()
    }

    #[test]
    fn range_skips_nodata_nan_and_infinity() {
        let data = vec![
            5.0, -9999.0, 7.0, 1.0,
            f32::NAN, 3.0, f32::INFINITY, 2.0,
            4.0, 4.0, f32::NEG_INFINITY, 9.0,
            6.0, 6.0, 6.0, 6.0,
        ];
        let grid = ElevationGrid::new(data, 4, 4, unit_extent(), DEFAULT_NODATA).unwrap();
        assert_eq!(grid.range(), Some((1.0, 9.0)));
        assert_eq!(grid.value(0, 1), None);
        assert_eq!(grid.value(1, 0), None);
        assert_eq!(grid.value(0, 0), Some(5.0));
    }

    #[test]
    fn all_nodata_grid_has_no_range() {
        let grid = ElevationGrid::new(vec![-9999.0; 16], 4, 4, unit_extent(), DEFAULT_NODATA)
            .unwrap();
        assert_eq!(grid.range(), None);
        assert_eq!(grid.min_elevation(), None);
    }

    #[test]
    fn buffer_length_must_match_dimensions() {
        let err = ElevationGrid::new(vec![0.0; 15], 4, 4, unit_extent(), DEFAULT_NODATA);
        assert!(matches!(err, Err(TerrainError::Precondition(_))));
    }

    #[test]
    fn inverted_extent_is_rejected() {
        assert!(Extent::new(1.0, 0.0, 0.0, 1.0).is_err());
        assert!(Extent::new(0.0, 0.0, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn containment_owns_the_north_west_edges() {
        let e = unit_extent();
        assert!(e.contains(0.0, 4.0));
        assert!(e.contains(2.0, 2.0));
        assert!(!e.contains(4.0, 2.0));
        assert!(!e.contains(2.0, 0.0));
        assert!(!e.contains(-0.1, 2.0));
    }

    #[test]
    fn cell_size_follows_extent_and_dimensions() {
        let extent = Extent::new(100.0, 200.0, 140.0, 220.0).unwrap();
        let grid = ElevationGrid::from_fn(8, 4, extent, DEFAULT_NODATA, |_, _| 0.0).unwrap();
        assert_eq!(grid.cell_size(), (5.0, 5.0));
    }

    #[test]
    fn from_fn_is_row_major() {
        let grid = ElevationGrid::from_fn(3, 2, unit_extent(), DEFAULT_NODATA, |r, c| {
            (r * 10 + c) as f32
        })
        .unwrap();
        assert_eq!(grid.data(), &[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(grid.get(1, 2), 12.0);
    }
}
