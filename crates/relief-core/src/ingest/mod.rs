//! Raster ingestion: decode → pick nodata and CRS → reproject the bounding
//! box → build an immutable [`ElevationGrid`].

pub mod geotiff;
pub mod hgt;

pub use geotiff::GeoTiffDecoder;
pub use hgt::HgtDecoder;

use std::time::Instant;

use log::{debug, info};

use crate::crs::{reproject_extent, Crs, ReprojectionTier, Reprojector, SphericalMercator};
use crate::error::{Result, TerrainError};
use crate::grid::{ElevationGrid, Extent, DEFAULT_NODATA};
use crate::params::IngestOptions;

/// What a raster decoder hands over: the first band plus georeferencing.
#[derive(Debug, Clone)]
pub struct RasterSource {
    /// Row-major samples, row 0 north.
    pub samples: Vec<f32>,
    pub width: usize,
    pub height: usize,
    /// Bounding box in the source CRS.
    pub bbox: Extent,
    /// `None` when the container declares no usable CRS.
    pub crs: Option<Crs>,
    pub nodata: Option<f64>,
}

/// Turns raw container bytes into a [`RasterSource`].
pub trait RasterDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<RasterSource>;
}

/// An ingested grid together with how its extent was obtained.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub grid: ElevationGrid,
    /// CRS the source was read as (after defaulting).
    pub source_crs: Crs,
    pub tier: ReprojectionTier,
}

/// Ingest GeoTIFF bytes with default options: Web Mercator display CRS and
/// the built-in reprojector.
pub fn ingest(bytes: &[u8]) -> Result<ElevationGrid> {
    ingest_with(bytes, &GeoTiffDecoder, &SphericalMercator, &IngestOptions::default())
        .map(|ingested| ingested.grid)
}

pub fn ingest_with(
    bytes: &[u8],
    decoder: &dyn RasterDecoder,
    reprojector: &dyn Reprojector,
    options: &IngestOptions,
) -> Result<Ingested> {
    let started = Instant::now();
    let source = decoder.decode(bytes)?;

    let nodata = options
        .nodata
        .or(source.nodata.map(|v| v as f32))
        .unwrap_or(DEFAULT_NODATA);
    let source_crs = source.crs.unwrap_or_else(|| {
        debug!("no CRS declared, assuming {}", Crs::Wgs84);
        Crs::Wgs84
    });

    let reprojected = reproject_extent(&source.bbox, source_crs, options.display_crs, reprojector)?;

    let grid = ElevationGrid::new(source.samples, source.width, source.height, reprojected.extent, nodata)
        .map_err(|e| TerrainError::Read(e.to_string()))?
        .with_crs(options.display_crs);

    info!(
        "ingested {}×{} grid ({} -> {}, {:?}) range {:?} in {:?}",
        source.width,
        source.height,
        source_crs,
        options.display_crs,
        reprojected.tier,
        grid.range(),
        started.elapsed()
    );

    Ok(Ingested { grid, source_crs, tier: reprojected.tier })
}
