//! End-to-end ingestion of GeoTIFFs synthesized in memory with the `tiff`
//! encoder.

use std::io::Cursor;

use approx::assert_relative_eq;
use relief_core::crs::lon_lat_to_mercator;
use relief_core::ingest::GeoTiffDecoder;
use relief_core::{
    ingest, ingest_with, Crs, IngestOptions, Raster, ReprojectionTier, SphericalMercator,
    TerrainError,
};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

const W: u32 = 6;
const H: u32 = 4;

struct Fixture {
    scale: [f64; 3],
    tiepoint: [f64; 6],
    geokeys: Option<Vec<u16>>,
    nodata: Option<&'static str>,
}

impl Fixture {
    fn wgs84() -> Self {
        Self {
            scale: [0.01, 0.01, 0.0],
            tiepoint: [0.0, 0.0, 0.0, 10.0, 46.0, 0.0],
            geokeys: Some(vec![1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4326]),
            nodata: Some("-9999"),
        }
    }

    fn utm() -> Self {
        Self {
            scale: [30.0, 30.0, 0.0],
            tiepoint: [0.0, 0.0, 0.0, 500_000.0, 5_000_120.0, 0.0],
            geokeys: Some(vec![1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 32633]),
            nodata: None,
        }
    }

    fn encode(&self, data: &[f32]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut buf).unwrap();
            let mut image = encoder.new_image::<colortype::Gray32Float>(W, H).unwrap();
            image
                .encoder()
                .write_tag(Tag::ModelPixelScaleTag, &self.scale[..])
                .unwrap();
            image
                .encoder()
                .write_tag(Tag::ModelTiepointTag, &self.tiepoint[..])
                .unwrap();
            if let Some(keys) = &self.geokeys {
                image
                    .encoder()
                    .write_tag(Tag::GeoKeyDirectoryTag, &keys[..])
                    .unwrap();
            }
            if let Some(nodata) = self.nodata {
                image.encoder().write_tag(Tag::GdalNodata, nodata).unwrap();
            }
            image.write_data(data).unwrap();
        }
        buf.into_inner()
    }
}

fn samples() -> Vec<f32> {
    let mut data: Vec<f32> = (0..W * H).map(|i| 100.0 + i as f32).collect();
    data[7] = -9999.0;
    data
}

fn wgs84_display() -> IngestOptions {
    IngestOptions { display_crs: Crs::Wgs84, ..IngestOptions::default() }
}

#[test]
fn geotiff_tags_drive_extent_crs_and_nodata() {
    let bytes = Fixture::wgs84().encode(&samples());
    let out = ingest_with(&bytes, &GeoTiffDecoder, &SphericalMercator, &wgs84_display()).unwrap();

    assert_eq!(out.source_crs, Crs::Wgs84);
    assert_eq!(out.tier, ReprojectionTier::Direct);

    let grid = &out.grid;
    assert_eq!((grid.width(), grid.height()), (6, 4));
    assert_eq!(grid.data().len(), 24);
    assert_eq!(grid.nodata(), -9999.0);
    assert_eq!(grid.value(1, 1), None);
    assert_eq!(grid.range(), Some((100.0, 123.0)));

    let e = grid.extent();
    assert_relative_eq!(e.min_x, 10.0, epsilon = 1e-9);
    assert_relative_eq!(e.max_x, 10.06, epsilon = 1e-9);
    assert_relative_eq!(e.min_y, 45.96, epsilon = 1e-9);
    assert_relative_eq!(e.max_y, 46.0, epsilon = 1e-9);
}

#[test]
fn default_ingest_projects_to_web_mercator() {
    let bytes = Fixture::wgs84().encode(&samples());
    let grid = ingest(&bytes).unwrap();
    assert_eq!(grid.crs(), Crs::WebMercator);

    let (min_x, min_y) = lon_lat_to_mercator(10.0, 45.96);
    let (max_x, max_y) = lon_lat_to_mercator(10.06, 46.0);
    let e = grid.extent();
    assert_relative_eq!(e.min_x, min_x, epsilon = 1e-3);
    assert_relative_eq!(e.min_y, min_y, epsilon = 1e-3);
    assert_relative_eq!(e.max_x, max_x, epsilon = 1e-3);
    assert_relative_eq!(e.max_y, max_y, epsilon = 1e-3);
}

#[test]
fn unsupported_projected_crs_is_kept_as_projected() {
    let bytes = Fixture::utm().encode(&samples());
    let out = ingest_with(&bytes, &GeoTiffDecoder, &SphericalMercator, &IngestOptions::default())
        .unwrap();

    assert_eq!(out.source_crs, Crs::Epsg(32633));
    assert_eq!(out.tier, ReprojectionTier::AlreadyProjected);
    let e = out.grid.extent();
    assert_relative_eq!(e.min_x, 500_000.0);
    assert_relative_eq!(e.max_x, 500_180.0);
    assert_relative_eq!(e.min_y, 5_000_000.0);
    assert_relative_eq!(e.max_y, 5_000_120.0);
    // No GDAL_NODATA tag: the default sentinel applies.
    assert_eq!(out.grid.nodata(), -9999.0);
}

#[test]
fn missing_geokeys_assume_wgs84() {
    let fixture = Fixture { geokeys: None, ..Fixture::wgs84() };
    let out = ingest_with(&fixture.encode(&samples()), &GeoTiffDecoder, &SphericalMercator, &wgs84_display())
        .unwrap();
    assert_eq!(out.source_crs, Crs::Wgs84);
}

#[test]
fn nodata_override_beats_the_tag() {
    let bytes = Fixture::wgs84().encode(&samples());
    let options = IngestOptions { nodata: Some(100.0), ..wgs84_display() };
    let grid = ingest_with(&bytes, &GeoTiffDecoder, &SphericalMercator, &options).unwrap().grid;
    assert_eq!(grid.value(0, 0), None);
    assert_eq!(grid.value(1, 1), Some(-9999.0));
    assert_eq!(grid.range(), Some((-9999.0, 123.0)));
}

#[test]
fn tiff_without_georeferencing_is_a_parse_error() {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buf).unwrap();
        encoder
            .write_image::<colortype::Gray32Float>(W, H, &samples())
            .unwrap();
    }
    let err = ingest(&buf.into_inner()).unwrap_err();
    assert!(matches!(err, TerrainError::Parse(_)), "got {err:?}");
}

#[test]
fn truncated_file_fails_cleanly() {
    let bytes = Fixture::wgs84().encode(&samples());
    let err = ingest(&bytes[..16]).unwrap_err();
    assert!(matches!(err, TerrainError::Parse(_) | TerrainError::Read(_)), "got {err:?}");
}
