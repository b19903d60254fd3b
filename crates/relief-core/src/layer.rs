//! Map-layer adapter: a named raster plus its styling, rendered on demand for
//! whatever view the host map asks for.

use std::sync::Arc;

use crate::color::{ColorMapping, RampPreset};
use crate::derivatives::DerivativeGrid;
use crate::error::Result;
use crate::grid::{ElevationGrid, Extent, Raster};
use crate::render::{render_region, RgbaBuffer};

type SharedRaster = Arc<dyn Raster + Send + Sync>;

#[derive(Clone)]
pub struct RasterLayer {
    name: String,
    opacity: f32,
    source: SharedRaster,
    mapping: ColorMapping,
}

impl RasterLayer {
    pub fn new(name: impl Into<String>, source: SharedRaster, mapping: ColorMapping) -> Self {
        Self { name: name.into(), opacity: 1.0, source, mapping }
    }

    /// Elevation layer colored with `preset`.
    pub fn elevation(name: impl Into<String>, grid: ElevationGrid, preset: RampPreset) -> Self {
        Self::new(name, Arc::new(grid), ColorMapping::Ramp(preset.ramp()))
    }

    /// Derivative layer styled with the grid's own scheme.
    pub fn derivative(name: impl Into<String>, grid: DerivativeGrid) -> Self {
        let mapping = grid.scheme().mapping();
        Self::new(name, Arc::new(grid), mapping)
    }

    /// Opacity is clamped to [0, 1]; NaN keeps the layer opaque.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.set_opacity(opacity);
        self
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn mapping(&self) -> &ColorMapping {
        &self.mapping
    }

    pub fn extent(&self) -> Extent {
        *self.source.extent()
    }

    pub fn render(&self, view: &Extent, (width, height): (usize, usize)) -> Result<RgbaBuffer> {
        let mut buf = render_region(self.source.as_ref(), view, width, height, &self.mapping)?;
        if self.opacity < 1.0 {
            for px in buf.pixels.chunks_exact_mut(4) {
                px[3] = (px[3] as f32 * self.opacity).round() as u8;
            }
        }
        Ok(buf)
    }
}

impl std::fmt::Debug for RasterLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterLayer")
            .field("name", &self.name)
            .field("opacity", &self.opacity)
            .field("extent", self.source.extent())
            .field("mapping", &self.mapping)
            .finish()
    }
}
