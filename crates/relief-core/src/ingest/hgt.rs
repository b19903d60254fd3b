//! SRTM / NASADEM `.hgt` tiles.
//!
//! HGT files are flat arrays of big-endian i16 elevations covering a 1° × 1°
//! tile. The file name encodes the SW corner (e.g. `N25E056.hgt`); samples are
//! posted on the tile edges, so neighbouring tiles share their border rows.

use log::debug;

use super::{RasterDecoder, RasterSource};
use crate::crs::Crs;
use crate::error::{Result, TerrainError};
use crate::grid::Extent;

/// Void value in HGT files.
pub const HGT_VOID: i16 = -32768;

/// Parse an HGT filename into its SW corner `(lat, lon)`.
/// Accepts `N25E056.hgt` or `S10W045.HGT`; directory components are ignored.
pub fn parse_hgt_filename(filename: &str) -> Option<(f64, f64)> {
    let filename = filename.rsplit(['/', '\\']).next()?;
    let name = filename
        .strip_suffix(".hgt")
        .or_else(|| filename.strip_suffix(".HGT"))?;
    if name.len() != 7 || !name.is_ascii() {
        return None;
    }

    let lat_sign = match &name[0..1] {
        "N" | "n" => 1.0,
        "S" | "s" => -1.0,
        _ => return None,
    };
    let lat: f64 = name[1..3].parse().ok()?;
    let lon_sign = match &name[3..4] {
        "E" | "e" => 1.0,
        "W" | "w" => -1.0,
        _ => return None,
    };
    let lon: f64 = name[4..7].parse().ok()?;
    if lat > 90.0 || lon > 180.0 {
        return None;
    }

    Some((lat * lat_sign, lon * lon_sign))
}

/// Decoder for a single tile whose SW corner is known up front.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HgtDecoder {
    pub south: f64,
    pub west: f64,
}

impl HgtDecoder {
    pub fn new(south: f64, west: f64) -> Self {
        Self { south, west }
    }

    pub fn from_filename(filename: &str) -> Result<Self> {
        let (south, west) = parse_hgt_filename(filename).ok_or_else(|| {
            TerrainError::Parse(format!("cannot parse HGT coordinates from {filename:?}"))
        })?;
        Ok(Self { south, west })
    }
}

/// Side length of the square tile for a given byte count:
/// 3601 for 1 arc-second, 1201 for 3 arc-second.
fn tile_side(byte_count: usize) -> Option<usize> {
    [3601, 1201].into_iter().find(|side| side * side * 2 == byte_count)
}

impl RasterDecoder for HgtDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<RasterSource> {
        let side = tile_side(bytes.len()).ok_or_else(|| {
            TerrainError::Parse(format!(
                "unexpected HGT size: {} bytes (expected {} or {})",
                bytes.len(),
                3601 * 3601 * 2,
                1201 * 1201 * 2
            ))
        })?;

        let samples: Vec<f32> = bytes
            .chunks_exact(2)
            .map(|pair| f32::from(i16::from_be_bytes([pair[0], pair[1]])))
            .collect();

        // Posts sit on the tile edges: widen by half a cell so that cell
        // centres land on the posts.
        let cell = 1.0 / (side - 1) as f64;
        let half = cell / 2.0;
        let bbox = Extent::new(
            self.west - half,
            self.south - half,
            self.west + 1.0 + half,
            self.south + 1.0 + half,
        )?;
        debug!("HGT tile {side}×{side} at ({}, {})", self.south, self.west);

        Ok(RasterSource {
            samples,
            width: side,
            height: side,
            bbox,
            crs: Some(Crs::Wgs84),
            nodata: Some(f64::from(HGT_VOID)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn parses_tile_names() {
        assert_eq!(parse_hgt_filename("N25E056.hgt"), Some((25.0, 56.0)));
        assert_eq!(parse_hgt_filename("S10W045.HGT"), Some((-10.0, -45.0)));
        assert_eq!(parse_hgt_filename("tiles/n00e000.hgt"), Some((0.0, 0.0)));
        assert_eq!(parse_hgt_filename("X25E056.hgt"), None);
        assert_eq!(parse_hgt_filename("N25E056.tif"), None);
        assert_eq!(parse_hgt_filename("N2E56.hgt"), None);
    }

    #[test]
    fn rejects_unknown_sizes() {
        let err = HgtDecoder::new(0.0, 0.0).decode(&[0u8; 100]).unwrap_err();
        assert!(matches!(err, TerrainError::Parse(_)));
        assert!(HgtDecoder::from_filename("readme.txt").is_err());
    }

    #[test]
    fn decodes_three_arc_second_tile() {
        let side = 1201;
        let mut bytes = vec![0u8; side * side * 2];
        bytes[0..2].copy_from_slice(&1234i16.to_be_bytes());
        bytes[2..4].copy_from_slice(&HGT_VOID.to_be_bytes());
        let last = bytes.len() - 2;
        bytes[last..].copy_from_slice(&(-12i16).to_be_bytes());

        let src = HgtDecoder::from_filename("N25E056.hgt").unwrap().decode(&bytes).unwrap();
        assert_eq!((src.width, src.height), (side, side));
        assert_eq!(src.samples[0], 1234.0);
        assert_eq!(src.samples[1], -32768.0);
        assert_eq!(src.samples[side * side - 1], -12.0);
        assert_eq!(src.crs, Some(Crs::Wgs84));
        assert_eq!(src.nodata, Some(-32768.0));

        let half = 0.5 / 1200.0;
        assert_relative_eq!(src.bbox.min_x, 56.0 - half);
        assert_relative_eq!(src.bbox.max_y, 26.0 + half);
        assert_relative_eq!(src.bbox.span_x() / side as f64, 1.0 / 1200.0, epsilon = 1e-12);
    }
}
