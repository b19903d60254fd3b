//! Command-line front end: ingest a DEM, run one analysis, write a PNG or
//! GeoJSON result.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use log::{info, warn, LevelFilter};
use serde::Serialize;

use relief_core::color::ColorMapping;
use relief_core::ingest::{GeoTiffDecoder, HgtDecoder, RasterDecoder};
use relief_core::render::render_region_with;
use relief_core::{
    aspect, contours, hillshade, ingest_with, slope, AnalysisConfig, Crs, Extent, Ingested,
    RampPreset, Raster, SlopeUnit, SphericalMercator,
};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "relief", about = "Terrain analysis for GeoTIFF and SRTM elevation rasters")]
struct Cli {
    /// JSON file with an AnalysisConfig; missing fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output width in pixels (defaults to the grid width)
    #[arg(long, global = true)]
    width: Option<usize>,

    /// Output height in pixels (defaults to the grid height)
    #[arg(long, global = true)]
    height: Option<usize>,

    /// More log output (-v info, -vv debug, -vvv trace); RUST_LOG also applies
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Input {
    /// GeoTIFF or .hgt tile
    input: PathBuf,

    /// Override the nodata value declared by the raster
    #[arg(long)]
    nodata: Option<f32>,

    /// Display CRS as an EPSG code (4326 or 3857)
    #[arg(long)]
    epsg: Option<u32>,
}

#[derive(Args, Debug)]
struct Image {
    /// PNG to write
    #[arg(short, long)]
    output: PathBuf,

    /// View window `min_x,min_y,max_x,max_y` in the display CRS
    #[arg(long, value_delimiter = ',', num_args = 4, allow_hyphen_values = true)]
    view: Option<Vec<f64>>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print dimensions, extent, CRS and elevation range as JSON
    Info {
        #[command(flatten)]
        input: Input,
    },
    Hillshade {
        #[command(flatten)]
        input: Input,
        #[command(flatten)]
        image: Image,
        #[arg(long)]
        azimuth: Option<f64>,
        #[arg(long)]
        altitude: Option<f64>,
        #[arg(long)]
        z_factor: Option<f64>,
    },
    Slope {
        #[command(flatten)]
        input: Input,
        #[command(flatten)]
        image: Image,
        /// Percent rise instead of degrees
        #[arg(long)]
        percent: bool,
        #[arg(long)]
        z_factor: Option<f64>,
    },
    Aspect {
        #[command(flatten)]
        input: Input,
        #[command(flatten)]
        image: Image,
    },
    /// Color the raw elevation with a ramp
    Elevation {
        #[command(flatten)]
        input: Input,
        #[command(flatten)]
        image: Image,
        #[arg(long, value_enum)]
        ramp: Option<Ramp>,
    },
    /// Extract contour lines as GeoJSON
    Contours {
        #[command(flatten)]
        input: Input,
        /// GeoJSON file to write (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        interval: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        min_elevation: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        max_elevation: Option<f64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Ramp {
    Terrain,
    Grayscale,
    Slope,
}

impl From<Ramp> for RampPreset {
    fn from(ramp: Ramp) -> Self {
        match ramp {
            Ramp::Terrain => RampPreset::Terrain,
            Ramp::Grayscale => RampPreset::Grayscale,
            Ramp::Slope => RampPreset::Slope,
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    let Some(path) = path else {
        return Ok(AnalysisConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn is_hgt(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("hgt"))
}

fn load(input: &Input, config: &mut AnalysisConfig) -> Result<Ingested> {
    if let Some(nodata) = input.nodata {
        config.ingest.nodata = Some(nodata);
    }
    if let Some(code) = input.epsg {
        config.ingest.display_crs = match Crs::from_epsg(code) {
            Some(crs @ (Crs::Wgs84 | Crs::WebMercator)) => crs,
            _ => bail!("display CRS must be EPSG:4326 or EPSG:3857, got {code}"),
        };
    }

    let bytes = fs::read(&input.input)
        .with_context(|| format!("reading {}", input.input.display()))?;
    let decoder: Box<dyn RasterDecoder> = if is_hgt(&input.input) {
        let name = input
            .input
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("invalid HGT filename {}", input.input.display()))?;
        Box::new(HgtDecoder::from_filename(name)?)
    } else {
        Box::new(GeoTiffDecoder)
    };

    let ingested = ingest_with(&bytes, decoder.as_ref(), &SphericalMercator, &config.ingest)
        .with_context(|| format!("ingesting {}", input.input.display()))?;
    if ingested.tier.is_fallback() {
        warn!("extent obtained via {:?} fallback", ingested.tier);
    }
    Ok(ingested)
}

struct Frame {
    view: Extent,
    width: usize,
    height: usize,
}

fn frame(cli: &Cli, image: &Image, grid: &dyn Raster) -> Result<Frame> {
    let view = match image.view.as_deref() {
        Some(&[min_x, min_y, max_x, max_y]) => Extent::new(min_x, min_y, max_x, max_y)?,
        Some(other) => bail!("--view takes 4 numbers, got {}", other.len()),
        None => *grid.extent(),
    };
    Ok(Frame {
        view,
        width: cli.width.unwrap_or_else(|| grid.width()),
        height: cli.height.unwrap_or_else(|| grid.height()),
    })
}

fn write_png<R: Raster + Sync + ?Sized>(
    source: &R,
    mapping: &ColorMapping,
    frame: &Frame,
    config: &AnalysisConfig,
    path: &Path,
) -> Result<()> {
    let buf = render_region_with(source, &frame.view, frame.width, frame.height, mapping, &config.render)?;
    let img = image::RgbaImage::from_raw(buf.width as u32, buf.height as u32, buf.into_raw())
        .ok_or_else(|| anyhow!("pixel buffer does not match {}×{}", frame.width, frame.height))?;
    img.save(path).with_context(|| format!("writing {}", path.display()))?;
    info!("wrote {} ({}×{})", path.display(), frame.width, frame.height);
    Ok(())
}

#[derive(Serialize)]
struct Summary<'a> {
    width: usize,
    height: usize,
    extent: &'a Extent,
    crs: String,
    source_crs: String,
    reprojection: relief_core::ReprojectionTier,
    nodata: f32,
    min_elevation: Option<f32>,
    max_elevation: Option<f32>,
}

// ── Entry point ──────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Command::Info { input } => {
            let Ingested { grid, source_crs, tier } = load(input, &mut config)?;
            let summary = Summary {
                width: grid.width(),
                height: grid.height(),
                extent: grid.extent(),
                crs: grid.crs().to_string(),
                source_crs: source_crs.to_string(),
                reprojection: tier,
                nodata: grid.nodata(),
                min_elevation: grid.min_elevation(),
                max_elevation: grid.max_elevation(),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Hillshade { input, image, azimuth, altitude, z_factor } => {
            let grid = load(input, &mut config)?.grid;
            let mut params = config.hillshade;
            params.azimuth = azimuth.unwrap_or(params.azimuth);
            params.altitude = altitude.unwrap_or(params.altitude);
            params.z_factor = z_factor.unwrap_or(params.z_factor);
            let shade = hillshade(&grid, &params)?;
            let frame = frame(&cli, image, &shade)?;
            write_png(&shade, &shade.scheme().mapping(), &frame, &config, &image.output)?;
        }
        Command::Slope { input, image, percent, z_factor } => {
            let grid = load(input, &mut config)?.grid;
            let mut params = config.slope;
            if *percent {
                params.unit = SlopeUnit::Percent;
            }
            params.z_factor = z_factor.unwrap_or(params.z_factor);
            let out = slope(&grid, &params)?;
            if let Some((lo, hi)) = out.bounds() {
                info!("slope range {lo:.2} .. {hi:.2} ({:?})", params.unit);
            }
            let frame = frame(&cli, image, &out)?;
            write_png(&out, &out.scheme().mapping(), &frame, &config, &image.output)?;
        }
        Command::Aspect { input, image } => {
            let grid = load(input, &mut config)?.grid;
            let out = aspect(&grid)?;
            let frame = frame(&cli, image, &out)?;
            write_png(&out, &out.scheme().mapping(), &frame, &config, &image.output)?;
        }
        Command::Elevation { input, image, ramp } => {
            let grid = load(input, &mut config)?.grid;
            let preset = ramp.map(RampPreset::from).unwrap_or(config.elevation_ramp);
            let frame = frame(&cli, image, &grid)?;
            write_png(&grid, &ColorMapping::Ramp(preset.ramp()), &frame, &config, &image.output)?;
        }
        Command::Contours { input, output, interval, min_elevation, max_elevation } => {
            let grid = load(input, &mut config)?.grid;
            let mut params = config.contours;
            params.interval = interval.unwrap_or(params.interval);
            params.min_elevation = min_elevation.or(params.min_elevation);
            params.max_elevation = max_elevation.or(params.max_elevation);
            let set = contours(&grid, &params)?;
            info!("{} levels, {} segments", set.levels.len(), set.segment_count());

            let json = serde_json::to_string(&set.to_geojson())?;
            match output {
                Some(path) => fs::write(path, json)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => {
                    let mut stdout = std::io::stdout().lock();
                    writeln!(stdout, "{json}")?;
                }
            }
        }
    }

    Ok(())
}
