//! Terrain analysis on digital elevation models.
//!
//! Ingest a georeferenced raster into an [`ElevationGrid`], derive hillshade,
//! slope and aspect, trace contour lines, and render any of them into RGBA
//! buffers for an arbitrary view window.

pub mod color;
pub mod contour;
pub mod crs;
pub mod derivatives;
pub mod error;
pub mod grid;
pub mod ingest;
pub mod layer;
pub mod params;
pub mod render;
pub mod worker;

pub use color::{ColorMapping, ColorRamp, ColorScheme, RampPreset};
pub use contour::{contours, ContourLevel, ContourSet, Point, Segment};
pub use crs::{Crs, ReprojectionTier, Reprojector, SphericalMercator};
pub use derivatives::{aspect, hillshade, slope, DerivativeGrid, DerivativeKind};
pub use error::{IngestError, Result, TerrainError};
pub use grid::{ElevationGrid, Extent, Raster};
pub use ingest::{ingest, ingest_with, Ingested, RasterDecoder, RasterSource};
pub use layer::RasterLayer;
pub use params::{AnalysisConfig, ContourParams, HillshadeParams, IngestOptions, RenderOptions, SlopeParams, SlopeUnit};
pub use render::{render_region, render_region_with, RgbaBuffer};
pub use worker::{AnalysisHandle, AnalysisWorker};
