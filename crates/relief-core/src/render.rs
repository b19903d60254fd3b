//! Resampling a grid into an RGBA pixel buffer for a view window.
//!
//! Each output pixel centre is mapped to a grid cell by floor indexing
//! (nearest neighbour). Nodata, out-of-extent and uncolorable cells come out
//! fully transparent. Nothing is cached: the whole buffer is recomputed for
//! every view.

#[cfg(feature = "threading")]
use rayon::prelude::*;
use log::debug;
use serde::Serialize;

use crate::color::ColorMapping;
use crate::error::{Result, TerrainError};
use crate::grid::{Extent, Raster};
use crate::params::RenderOptions;

pub const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Row-major RGBA8 pixels, `width · height · 4` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RgbaBuffer {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl RgbaBuffer {
    pub fn transparent(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0; width * height * 4] }
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }
}

/// [`render_region_with`] under the default frame budget.
pub fn render_region<R>(
    source: &R,
    view: &Extent,
    width: usize,
    height: usize,
    mapping: &ColorMapping,
) -> Result<RgbaBuffer>
where
    R: Raster + Sync + ?Sized,
{
    render_region_with(source, view, width, height, mapping, &RenderOptions::default())
}

/// Render `source` over `view` into a `width × height` buffer.
///
/// When `width · height` exceeds `options.max_pixels`, pixels are evaluated on
/// a proportionally smaller lattice and upscaled by nearest neighbour, so the
/// cost per frame stays bounded.
pub fn render_region_with<R>(
    source: &R,
    view: &Extent,
    width: usize,
    height: usize,
    mapping: &ColorMapping,
    options: &RenderOptions,
) -> Result<RgbaBuffer>
where
    R: Raster + Sync + ?Sized,
{
    if width == 0 || height == 0 {
        return Err(TerrainError::precondition(format!(
            "output size must be non-zero, got {width}×{height}"
        )));
    }

    let (rw, rh) = budgeted_size(width, height, options.max_pixels);
    let sampled = sample(source, view, rw, rh, mapping);
    if (rw, rh) == (width, height) {
        return Ok(sampled);
    }
    debug!("render capped: {width}×{height} evaluated at {rw}×{rh}");
    Ok(upscale(&sampled, width, height))
}

fn budgeted_size(width: usize, height: usize, max_pixels: usize) -> (usize, usize) {
    let requested = width.saturating_mul(height);
    if max_pixels == 0 || requested <= max_pixels {
        return (width, height);
    }
    let scale = (max_pixels as f64 / requested as f64).sqrt();
    let rw = ((width as f64 * scale).floor() as usize).max(1);
    let rh = ((height as f64 * scale).floor() as usize).max(1);
    // Clamping a thin side up to 1 must not push the product over budget.
    let rw = rw.min((max_pixels / rh).max(1));
    let rh = rh.min((max_pixels / rw).max(1));
    (rw, rh)
}

fn sample<R>(source: &R, view: &Extent, width: usize, height: usize, mapping: &ColorMapping) -> RgbaBuffer
where
    R: Raster + Sync + ?Sized,
{
    let grid_extent = *source.extent();
    let (cell_x, cell_y) = source.cell_size();
    let last_row = source.height().saturating_sub(1);
    let last_col = source.width().saturating_sub(1);
    let bounds = source.normalization();
    let px_w = view.span_x() / width as f64;
    let px_h = view.span_y() / height as f64;

    let fill_row = |py: usize, row: &mut [u8]| {
        let y = view.max_y - (py as f64 + 0.5) * px_h;
        let r = (((grid_extent.max_y - y) / cell_y) as usize).min(last_row);
        for (px, out) in row.chunks_exact_mut(4).enumerate() {
            let x = view.min_x + (px as f64 + 0.5) * px_w;
            if !grid_extent.contains(x, y) {
                continue;
            }
            let c = (((x - grid_extent.min_x) / cell_x) as usize).min(last_col);
            let rgb = source.value(r, c).and_then(|v| mapping.color(v, bounds));
            if let Some([cr, cg, cb]) = rgb {
                out.copy_from_slice(&[cr, cg, cb, 255]);
            }
        }
    };

    let mut buf = RgbaBuffer::transparent(width, height);
    #[cfg(feature = "threading")]
    buf.pixels
        .par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(py, row)| fill_row(py, row));
    #[cfg(not(feature = "threading"))]
    buf.pixels
        .chunks_mut(width * 4)
        .enumerate()
        .for_each(|(py, row)| fill_row(py, row));
    buf
}

fn upscale(src: &RgbaBuffer, width: usize, height: usize) -> RgbaBuffer {
    let mut out = RgbaBuffer::transparent(width, height);
    for y in 0..height {
        let sy = y * src.height / height;
        for x in 0..width {
            let sx = x * src.width / width;
            let i = (y * width + x) * 4;
            out.pixels[i..i + 4].copy_from_slice(&src.pixel(sx, sy));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::RampPreset;
    use crate::derivatives::aspect;
    use crate::grid::{ElevationGrid, DEFAULT_NODATA};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn terrain() -> ColorMapping {
        ColorMapping::Ramp(RampPreset::Terrain.ramp())
    }

    #[test]
    fn full_extent_render_matches_each_cell() {
        let extent = Extent::new(-1234.5, 800.0, 2765.5, 3800.0).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let data: Vec<f32> = (0..40 * 30)
            .map(|_| if rng.gen_bool(0.1) { DEFAULT_NODATA } else { rng.gen_range(0.0..900.0) })
            .collect();
        let grid = ElevationGrid::new(data, 40, 30, extent, DEFAULT_NODATA).unwrap();
        let mapping = terrain();

        let buf = render_region(&grid, &extent, 40, 30, &mapping).unwrap();
        for r in 0..30 {
            for c in 0..40 {
                let expected = match grid.value(r, c).and_then(|v| mapping.color(v, grid.range())) {
                    Some([cr, cg, cb]) => [cr, cg, cb, 255],
                    None => TRANSPARENT,
                };
                assert_eq!(buf.pixel(c, r), expected, "pixel ({c}, {r})");
            }
        }
    }

    #[test]
    fn outside_the_grid_is_transparent() {
        let extent = Extent::new(0.0, 0.0, 2.0, 2.0).unwrap();
        let grid = ElevationGrid::from_fn(2, 2, extent, DEFAULT_NODATA, |_, _| 5.0).unwrap();
        // View twice as wide, grid on the left half.
        let view = Extent::new(0.0, 0.0, 4.0, 2.0).unwrap();
        let buf = render_region(&grid, &view, 4, 2, &terrain()).unwrap();
        assert_eq!(buf.pixel(0, 0)[3], 255);
        assert_eq!(buf.pixel(1, 1)[3], 255);
        assert_eq!(buf.pixel(2, 0), TRANSPARENT);
        assert_eq!(buf.pixel(3, 1), TRANSPARENT);
    }

    #[test]
    fn row_zero_is_north() {
        let extent = Extent::new(0.0, 0.0, 1.0, 2.0).unwrap();
        let grid = ElevationGrid::new(vec![100.0, 0.0], 1, 2, extent, DEFAULT_NODATA).unwrap();
        let mapping = ColorMapping::Ramp(RampPreset::Grayscale.ramp());
        let buf = render_region(&grid, &extent, 1, 2, &mapping).unwrap();
        assert_eq!(buf.pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(buf.pixel(0, 1), [0, 0, 0, 255]);
    }

    #[test]
    fn flat_aspect_cells_are_transparent() {
        let extent = Extent::new(0.0, 0.0, 5.0, 5.0).unwrap();
        let grid = ElevationGrid::from_fn(5, 5, extent, DEFAULT_NODATA, |_, _| 7.0).unwrap();
        let out = aspect(&grid).unwrap();
        let buf = render_region(&out, &extent, 5, 5, &out.scheme().mapping()).unwrap();
        assert!(buf.pixels.iter().all(|&b| b == 0));
    }

    #[test]
    fn frame_budget_caps_work_but_keeps_output_size() {
        let extent = Extent::new(0.0, 0.0, 2.0, 1.0).unwrap();
        let grid = ElevationGrid::new(vec![0.0, 10.0], 2, 1, extent, DEFAULT_NODATA).unwrap();
        let mapping = ColorMapping::Ramp(RampPreset::Grayscale.ramp());
        let options = RenderOptions { max_pixels: 50 };

        let buf = render_region_with(&grid, &extent, 100, 10, &mapping, &options).unwrap();
        assert_eq!((buf.width, buf.height), (100, 10));
        assert_eq!(buf.pixels.len(), 100 * 10 * 4);
        assert_eq!(buf.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(buf.pixel(99, 9), [255, 255, 255, 255]);
    }

    #[test]
    fn budget_shrinks_proportionally() {
        assert_eq!(budgeted_size(100, 10, 50), (22, 2));
        assert_eq!(budgeted_size(64, 64, 4096), (64, 64));
    }

    #[test]
    fn budget_holds_for_extreme_aspect_ratios() {
        assert_eq!(budgeted_size(1000, 1, 100), (100, 1));
        assert_eq!(budgeted_size(1, 1000, 100), (1, 100));
        for (w, h, max) in [(5000, 3, 700), (2, 9999, 10), (4096, 4096, 17), (333, 7, 20)] {
            let (rw, rh) = budgeted_size(w, h, max);
            assert!(rw >= 1 && rh >= 1);
            assert!(rw <= w && rh <= h);
            assert!(rw * rh <= max, "{w}×{h} under {max} gave {rw}×{rh}");
        }
    }

    #[test]
    fn thin_frame_render_keeps_requested_size() {
        let extent = Extent::new(0.0, 0.0, 2.0, 1.0).unwrap();
        let grid = ElevationGrid::new(vec![0.0, 10.0], 2, 1, extent, DEFAULT_NODATA).unwrap();
        let mapping = ColorMapping::Ramp(RampPreset::Grayscale.ramp());
        let options = RenderOptions { max_pixels: 100 };
        let buf = render_region_with(&grid, &extent, 1000, 1, &mapping, &options).unwrap();
        assert_eq!(buf.pixels.len(), 1000 * 4);
        assert_eq!(buf.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(buf.pixel(999, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn zero_sized_output_is_rejected() {
        let extent = Extent::new(0.0, 0.0, 1.0, 1.0).unwrap();
        let grid = ElevationGrid::new(vec![1.0], 1, 1, extent, DEFAULT_NODATA).unwrap();
        assert!(render_region(&grid, &extent, 0, 10, &terrain()).is_err());
    }
}
