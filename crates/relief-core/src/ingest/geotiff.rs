//! GeoTIFF decoding on top of the `tiff` crate.
//!
//! Georeferencing comes from ModelPixelScale + ModelTiepoint, or from a
//! non-rotated ModelTransformation. The CRS comes from the GeoKey directory
//! and nodata from the GDAL_NODATA ASCII tag.

use std::io::Cursor;

use log::{debug, warn};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use super::{RasterDecoder, RasterSource};
use crate::crs::Crs;
use crate::error::{Result, TerrainError};
use crate::grid::Extent;

// ── GeoKey ids ───────────────────────────────────────────────────────────────

const GT_MODEL_TYPE: u16 = 1024;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffDecoder;

impl RasterDecoder for GeoTiffDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<RasterSource> {
        let mut decoder = Decoder::new(Cursor::new(bytes))
            .map_err(|e| TerrainError::Parse(format!("not a TIFF: {e}")))?;
        let (w, h) = decoder
            .dimensions()
            .map_err(|e| TerrainError::Parse(format!("dimensions: {e}")))?;
        let (width, height) = (w as usize, h as usize);
        if width == 0 || height == 0 {
            return Err(TerrainError::Parse(format!("empty raster {width}×{height}")));
        }

        let bbox = read_bbox(&mut decoder, width, height)?;
        let crs = read_crs(&mut decoder)?;
        let nodata = read_nodata(&mut decoder)?;
        debug!("GeoTIFF {width}×{height} bbox={bbox:?} crs={crs:?} nodata={nodata:?}");

        let image = decoder
            .read_image()
            .map_err(|e| TerrainError::Read(e.to_string()))?;
        let samples = first_band(widen(image)?, width * height)?;

        Ok(RasterSource { samples, width, height, bbox, crs, nodata })
    }
}

fn tag_f64s(decoder: &mut Decoder<Cursor<&[u8]>>, tag: Tag) -> Result<Option<Vec<f64>>> {
    match decoder.find_tag(tag)? {
        Some(value) => Ok(Some(value.into_f64_vec()?)),
        None => Ok(None),
    }
}

fn read_bbox(decoder: &mut Decoder<Cursor<&[u8]>>, width: usize, height: usize) -> Result<Extent> {
    let (w, h) = (width as f64, height as f64);
    let scale = tag_f64s(decoder, Tag::ModelPixelScaleTag)?;
    let tiepoint = tag_f64s(decoder, Tag::ModelTiepointTag)?;

    let (min_x, min_y, max_x, max_y) = match (scale, tiepoint) {
        (Some(scale), Some(tie)) if scale.len() >= 2 && tie.len() >= 6 => {
            let (sx, sy) = (scale[0].abs(), scale[1].abs());
            // Tiepoint: raster (i, j, k) ↔ model (x, y, z).
            let min_x = tie[3] - tie[0] * sx;
            let max_y = tie[4] + tie[1] * sy;
            (min_x, max_y - h * sy, min_x + w * sx, max_y)
        }
        _ => {
            let Some(t) = tag_f64s(decoder, Tag::ModelTransformationTag)? else {
                return Err(TerrainError::Parse("no georeferencing tags".into()));
            };
            if t.len() < 16 {
                return Err(TerrainError::Parse(format!(
                    "ModelTransformation has {} values, expected 16",
                    t.len()
                )));
            }
            if t[1] != 0.0 || t[4] != 0.0 {
                return Err(TerrainError::Parse("rotated rasters are not supported".into()));
            }
            let (x0, x1) = (t[3], t[3] + w * t[0]);
            let (y0, y1) = (t[7], t[7] + h * t[5]);
            (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
        }
    };

    Extent::new(min_x, min_y, max_x, max_y).map_err(|e| TerrainError::Parse(e.to_string()))
}

/// CRS from the GeoKey directory: projected code first, then geographic.
/// Missing or user-defined codes yield `None`.
fn read_crs(decoder: &mut Decoder<Cursor<&[u8]>>) -> Result<Option<Crs>> {
    let Some(value) = decoder.find_tag(Tag::GeoKeyDirectoryTag)? else {
        return Ok(None);
    };
    let keys = value.into_u16_vec()?;
    Ok(crs_from_geokeys(&keys))
}

pub(crate) fn crs_from_geokeys(keys: &[u16]) -> Option<Crs> {
    if keys.len() < 4 {
        return None;
    }
    let mut model_type = None;
    let mut geographic = None;
    let mut projected = None;
    for entry in keys[4..].chunks_exact(4).take(keys[3] as usize) {
        // Only keys stored inline (location 0) carry a code.
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 {
            continue;
        }
        match key {
            GT_MODEL_TYPE => model_type = Some(value),
            GEOGRAPHIC_TYPE => geographic = Crs::from_epsg(value as u32),
            PROJECTED_CS_TYPE => projected = Crs::from_epsg(value as u32),
            _ => {}
        }
    }

    let crs = projected.or(geographic);
    if crs.is_none() && model_type == Some(MODEL_TYPE_PROJECTED) {
        warn!("projected GeoTIFF without an EPSG code, CRS is ambiguous");
    }
    crs
}

fn read_nodata(decoder: &mut Decoder<Cursor<&[u8]>>) -> Result<Option<f64>> {
    let Some(value) = decoder.find_tag(Tag::GdalNodata)? else {
        return Ok(None);
    };
    let text = value.into_string()?;
    let text = text.trim_matches(char::from(0)).trim();
    match text.parse::<f64>() {
        Ok(v) => Ok(Some(v)),
        Err(_) => {
            warn!("ignoring unparsable GDAL_NODATA {text:?}");
            Ok(None)
        }
    }
}

fn widen(image: DecodingResult) -> Result<Vec<f32>> {
    #[allow(unreachable_patterns)]
    let samples = match image {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|s| s as f32).collect(),
        _ => return Err(TerrainError::Read("unsupported sample type".into())),
    };
    Ok(samples)
}

/// Keep the first sample of every pixel from a chunky buffer.
fn first_band(samples: Vec<f32>, cells: usize) -> Result<Vec<f32>> {
    if samples.is_empty() || samples.len() % cells != 0 {
        return Err(TerrainError::Read(format!(
            "decoded {} samples for {cells} cells",
            samples.len()
        )));
    }
    let per_pixel = samples.len() / cells;
    if per_pixel == 1 {
        return Ok(samples);
    }
    debug!("keeping band 1 of {per_pixel}");
    Ok(samples.into_iter().step_by(per_pixel).collect())
}
