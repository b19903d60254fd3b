use anyhow::{anyhow, Context};
use js_sys::{Float32Array, Uint8ClampedArray};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use relief_core::color::ColorMapping;
use relief_core::ingest::{GeoTiffDecoder, HgtDecoder, RasterDecoder};
use relief_core::render::render_region_with;
use relief_core::{
    aspect, contours, hillshade, ingest_with, slope, AnalysisConfig, ContourParams, Crs,
    DerivativeGrid, ElevationGrid, Extent, HillshadeParams, Ingested, Raster, RenderOptions,
    ReprojectionTier, SlopeParams, SphericalMercator,
};

fn to_js(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{err:#}"))
}

/// `undefined` / `null` select the given defaults; anything else must
/// deserialize into `T`.
fn from_js<T: DeserializeOwned>(value: JsValue, defaults: T) -> anyhow::Result<T> {
    if value.is_undefined() || value.is_null() {
        return Ok(defaults);
    }
    serde_wasm_bindgen::from_value(value).map_err(|e| anyhow!("invalid parameters: {e}"))
}

fn to_plain<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| anyhow!("cannot convert result: {e}"))
}

/// `{ min_x, min_y, max_x, max_y }` in the display CRS.
fn view_extent(view: JsValue) -> anyhow::Result<Extent> {
    let raw: Extent =
        serde_wasm_bindgen::from_value(view).map_err(|e| anyhow!("invalid view extent: {e}"))?;
    Ok(Extent::new(raw.min_x, raw.min_y, raw.max_x, raw.max_y)?)
}

fn render_pixels<R: Raster + Sync + ?Sized>(
    source: &R,
    mapping: &ColorMapping,
    options: &RenderOptions,
    view: JsValue,
    width: usize,
    height: usize,
) -> anyhow::Result<Uint8ClampedArray> {
    let view = view_extent(view)?;
    let buf = render_region_with(source, &view, width, height, mapping, options)
        .with_context(|| format!("rendering {width}×{height}"))?;
    Ok(Uint8ClampedArray::from(buf.pixels.as_slice()))
}

/// An ingested DEM plus the configuration the page loaded it with.
#[wasm_bindgen]
pub struct TerrainSession {
    grid: ElevationGrid,
    source_crs: Crs,
    tier: ReprojectionTier,
    config: AnalysisConfig,
}

#[wasm_bindgen]
impl TerrainSession {
    /// Ingest GeoTIFF bytes. `config` is an optional `AnalysisConfig` object.
    #[wasm_bindgen(constructor)]
    pub fn new(bytes: &[u8], config: JsValue) -> Result<TerrainSession, JsValue> {
        Self::open(bytes, &GeoTiffDecoder, config).map_err(to_js)
    }

    /// Ingest an SRTM `.hgt` tile; the SW corner comes from `filename`.
    #[wasm_bindgen(js_name = fromHgt)]
    pub fn from_hgt(bytes: &[u8], filename: &str, config: JsValue) -> Result<TerrainSession, JsValue> {
        let decoder = HgtDecoder::from_filename(filename).map_err(|e| to_js(e.into()))?;
        Self::open(bytes, &decoder, config).map_err(to_js)
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> usize {
        self.grid.width()
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> usize {
        self.grid.height()
    }

    #[wasm_bindgen(getter)]
    pub fn extent(&self) -> Result<JsValue, JsValue> {
        to_plain(self.grid.extent()).map_err(to_js)
    }

    #[wasm_bindgen(getter, js_name = minElevation)]
    pub fn min_elevation(&self) -> Option<f32> {
        self.grid.min_elevation()
    }

    #[wasm_bindgen(getter, js_name = maxElevation)]
    pub fn max_elevation(&self) -> Option<f32> {
        self.grid.max_elevation()
    }

    #[wasm_bindgen(getter, js_name = sourceCrs)]
    pub fn source_crs(&self) -> String {
        self.source_crs.to_string()
    }

    /// Which reprojection step produced the extent, e.g. `"manual_mercator"`.
    #[wasm_bindgen(getter, js_name = reprojection)]
    pub fn reprojection(&self) -> Result<JsValue, JsValue> {
        to_plain(&self.tier).map_err(to_js)
    }

    pub fn hillshade(&self, params: JsValue) -> Result<DerivativeLayer, JsValue> {
        let run = || -> anyhow::Result<DerivativeLayer> {
            let params: HillshadeParams = from_js(params, self.config.hillshade)?;
            Ok(self.layer(hillshade(&self.grid, &params)?))
        };
        run().map_err(to_js)
    }

    pub fn slope(&self, params: JsValue) -> Result<DerivativeLayer, JsValue> {
        let run = || -> anyhow::Result<DerivativeLayer> {
            let params: SlopeParams = from_js(params, self.config.slope)?;
            Ok(self.layer(slope(&self.grid, &params)?))
        };
        run().map_err(to_js)
    }

    pub fn aspect(&self) -> Result<DerivativeLayer, JsValue> {
        aspect(&self.grid).map(|grid| self.layer(grid)).map_err(|e| to_js(e.into()))
    }

    /// Contours as a GeoJSON `FeatureCollection`.
    pub fn contours(&self, params: JsValue) -> Result<JsValue, JsValue> {
        let run = || -> anyhow::Result<JsValue> {
            let params: ContourParams = from_js(params, self.config.contours)?;
            let set = contours(&self.grid, &params)?;
            to_plain(&set.to_geojson())
        };
        run().map_err(to_js)
    }

    /// RGBA pixels of the elevation for `view`, colored with the configured ramp.
    pub fn render(&self, view: JsValue, width: usize, height: usize) -> Result<Uint8ClampedArray, JsValue> {
        let mapping = ColorMapping::Ramp(self.config.elevation_ramp.ramp());
        render_pixels(&self.grid, &mapping, &self.config.render, view, width, height).map_err(to_js)
    }
}

impl TerrainSession {
    fn open(bytes: &[u8], decoder: &dyn RasterDecoder, config: JsValue) -> anyhow::Result<Self> {
        let config: AnalysisConfig = from_js(config, AnalysisConfig::default())?;
        let Ingested { grid, source_crs, tier } =
            ingest_with(bytes, decoder, &SphericalMercator, &config.ingest)
                .context("ingesting elevation raster")?;
        Ok(Self { grid, source_crs, tier, config })
    }

    fn layer(&self, grid: DerivativeGrid) -> DerivativeLayer {
        DerivativeLayer { grid, render: self.config.render }
    }
}

/// A computed hillshade, slope or aspect grid.
#[wasm_bindgen]
pub struct DerivativeLayer {
    grid: DerivativeGrid,
    render: RenderOptions,
}

#[wasm_bindgen]
impl DerivativeLayer {
    #[wasm_bindgen(getter)]
    pub fn kind(&self) -> Result<JsValue, JsValue> {
        to_plain(&self.grid.kind()).map_err(to_js)
    }

    /// Normalization bounds `[min, max]`, absent for aspect.
    #[wasm_bindgen(getter)]
    pub fn bounds(&self) -> Option<Vec<f32>> {
        self.grid.bounds().map(|(lo, hi)| vec![lo, hi])
    }

    /// Raw values, row-major; nodata cells are NaN.
    pub fn values(&self) -> Float32Array {
        Float32Array::from(self.grid.data())
    }

    pub fn render(&self, view: JsValue, width: usize, height: usize) -> Result<Uint8ClampedArray, JsValue> {
        let mapping = self.grid.scheme().mapping();
        render_pixels(&self.grid, &mapping, &self.render, view, width, height).map_err(to_js)
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use relief_core::grid::DEFAULT_NODATA;
    use wasm_bindgen_test::wasm_bindgen_test;

    fn session() -> TerrainSession {
        let extent = Extent::new(0.0, 0.0, 8.0, 8.0).unwrap();
        let grid = ElevationGrid::from_fn(8, 8, extent, DEFAULT_NODATA, |r, c| (r * 8 + c) as f32)
            .unwrap();
        TerrainSession {
            grid,
            source_crs: Crs::Wgs84,
            tier: ReprojectionTier::Direct,
            config: AnalysisConfig::default(),
        }
    }

    fn full_view() -> JsValue {
        to_plain(&Extent::new(0.0, 0.0, 8.0, 8.0).unwrap()).unwrap()
    }

    #[wasm_bindgen_test]
    fn renders_rgba_for_the_requested_size() {
        let pixels = session().render(full_view(), 16, 4).unwrap();
        assert_eq!(pixels.length(), 16 * 4 * 4);
    }

    #[wasm_bindgen_test]
    fn derivative_defaults_come_from_config() {
        let layer = session().hillshade(JsValue::UNDEFINED).unwrap();
        assert_eq!(layer.bounds(), Some(vec![0.0, 255.0]));
        assert_eq!(layer.values().length(), 64);
    }

    #[wasm_bindgen_test]
    fn bad_parameters_are_reported() {
        let err = session().contours(JsValue::from_str("ten")).unwrap_err();
        assert!(err.as_string().unwrap().contains("invalid parameters"));
    }
}
