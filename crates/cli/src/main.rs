//! PeldGis CLI - zonal statistics and contours for PELD monitoring sites

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use peldgis_algorithms::batch::{run_zonal_batch, RasterJob, RegionSource};
use peldgis_algorithms::imagery::{ValueRange, VegetationIndex};
use peldgis_algorithms::output::ContourCollection;
use peldgis_algorithms::statistics::clip_raster;
use peldgis_algorithms::terrain::{contour_lines, ContourLevel, ContourParams, ElevationUnit};
use peldgis_algorithms::AnalysisConfig;
use peldgis_core::io::{load_boundary, read_geotiff, write_geotiff, GeoTiffOptions, TiffCompression};
use peldgis_core::{Raster, CRS};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "peldgis")]
#[command(author, version, about = "Zonal statistics and contours for PELD monitoring", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Zonal statistics of index rasters over region boundaries
    Zonal {
        /// Index raster as TAG[:KEY]=PATH, e.g. NDVI:NDVI_2023=ndvi_2023.tif
        #[arg(long = "raster", value_parser = parse_raster_job, required = true)]
        rasters: Vec<RasterJob>,
        /// Region boundary as LABEL=PATH (Shapefile or GeoJSON)
        #[arg(long = "region", value_parser = parse_region, required = true)]
        regions: Vec<RegionSource>,
        /// CRS to assume for every boundary, e.g. EPSG:31982
        #[arg(long)]
        region_crs: Option<CRS>,
        /// Analysis configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output JSON report
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Trace elevation contours from a DEM
    Contour {
        /// Input DEM file
        input: PathBuf,
        /// Output GeoJSON in the DEM's CRS
        #[arg(short, long)]
        output: PathBuf,
        /// Explicit levels, comma separated
        #[arg(long, value_delimiter = ',', conflicts_with_all = ["start", "stop", "step"])]
        levels: Option<Vec<f64>>,
        /// First level of a series
        #[arg(long, requires_all = ["stop", "step"])]
        start: Option<f64>,
        /// End of the series (exclusive)
        #[arg(long)]
        stop: Option<f64>,
        /// Spacing of the series
        #[arg(long)]
        step: Option<f64>,
        /// Lowest valid elevation
        #[arg(long)]
        min: Option<f64>,
        /// Highest valid elevation
        #[arg(long)]
        max: Option<f64>,
        /// Unit recorded on each feature: meters, feet
        #[arg(short, long)]
        unit: Option<ElevationUnit>,
        /// Also write the contours reprojected to WGS84
        #[arg(long)]
        wgs84_output: Option<PathBuf>,
        /// Analysis configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Clip a raster to a boundary; cells outside become NaN
    Clip {
        /// Input raster file
        input: PathBuf,
        /// Boundary file (Shapefile or GeoJSON)
        boundary: PathBuf,
        /// Output file
        output: PathBuf,
        /// Deflate-compress the output
        #[arg(long)]
        compress: bool,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path, None).context("Failed to read raster")?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("Failed to read config {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

/// `TAG[:KEY]=PATH`
fn parse_raster_job(s: &str) -> Result<RasterJob> {
    let (name, path) = s
        .split_once('=')
        .with_context(|| format!("Raster must be TAG[:KEY]=PATH, got: {}", s))?;
    let (tag, key) = match name.split_once(':') {
        Some((tag, key)) => (tag, Some(key)),
        None => (name, None),
    };
    let index: VegetationIndex = tag.parse().context("Invalid index tag")?;
    let job = RasterJob::new(index, path);
    Ok(match key {
        Some(key) if !key.is_empty() => job.with_key(key),
        _ => job,
    })
}

/// `LABEL=PATH`
fn parse_region(s: &str) -> Result<RegionSource> {
    match s.split_once('=') {
        Some((label, path)) if !label.is_empty() && !path.is_empty() => Ok(RegionSource::new(label, path)),
        _ => anyhow::bail!("Region must be LABEL=PATH, got: {}", s),
    }
}

fn contour_levels(
    levels: Option<Vec<f64>>,
    start: Option<f64>,
    stop: Option<f64>,
    step: Option<f64>,
    unit: ElevationUnit,
) -> Result<Vec<ContourLevel>> {
    match (levels, start, stop, step) {
        (Some(levels), ..) => Ok(levels.into_iter().map(|v| ContourLevel::new(v, unit)).collect()),
        (None, Some(start), Some(stop), Some(step)) => {
            ContourLevel::series(start, stop, step, unit).context("Invalid level series")
        }
        _ => anyhow::bail!("Give either --levels or --start, --stop and --step"),
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Transform: {:?}", raster.transform().to_gdal());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            match raster.crs() {
                Some(crs) => println!("CRS: {}", crs),
                None => println!("CRS: none"),
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
            );
        }

        // ── Zonal ────────────────────────────────────────────────────
        Commands::Zonal {
            rasters,
            regions,
            region_crs,
            config,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            let regions: Vec<RegionSource> = match region_crs {
                Some(crs) => regions.into_iter().map(|r| r.with_crs(crs.clone())).collect(),
                None => regions,
            };

            let start = Instant::now();
            let pb = spinner(&format!(
                "Computing {} raster(s) x {} region(s)...",
                rasters.len(),
                regions.len()
            ));
            let (report, tally) = run_zonal_batch(&rasters, &regions, &config);
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            report
                .write_json(&output)
                .with_context(|| format!("Failed to write report {}", output.display()))?;
            println!(
                "Pairs: {} ok, {} without valid data, {} failed",
                tally.succeeded, tally.no_data, tally.failed
            );
            done("Report", &output, elapsed);
        }

        // ── Contour ──────────────────────────────────────────────────
        Commands::Contour {
            input,
            output,
            levels,
            start,
            stop,
            step,
            min,
            max,
            unit,
            wgs84_output,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let unit = unit.unwrap_or(config.contour_unit);
            let levels = contour_levels(levels, start, stop, step, unit)?;
            let valid_range = ValueRange::new(
                min.unwrap_or(config.elevation_range.min()),
                max.unwrap_or(config.elevation_range.max()),
            )
            .context("Invalid elevation range")?;

            let dem = read_raster(&input)?;
            let begin = Instant::now();
            let params = ContourParams {
                valid_range,
                output_crs: None,
            };
            let features = contour_lines(&dem, &levels, &params).context("Failed to trace contours")?;
            info!("{} contour features over {} levels", features.len(), levels.len());

            let collection = ContourCollection::new(dem.crs().cloned(), features);
            collection
                .write_geojson(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            done("Contours", &output, begin.elapsed());

            if let Some(wgs84_output) = wgs84_output {
                collection
                    .reproject(&CRS::wgs84())
                    .context("Failed to reproject contours")?
                    .write_geojson(&wgs84_output)
                    .with_context(|| format!("Failed to write {}", wgs84_output.display()))?;
                done("WGS84 contours", &wgs84_output, begin.elapsed());
            }
        }

        // ── Clip ─────────────────────────────────────────────────────
        Commands::Clip {
            input,
            boundary,
            output,
            compress,
        } => {
            let raster = read_raster(&input)?;
            let boundary = load_boundary(&boundary).context("Failed to load boundary")?;
            let start = Instant::now();
            let clipped = clip_raster(&raster, &boundary).context("Failed to clip raster")?;
            let elapsed = start.elapsed();

            let pb = spinner("Writing output...");
            let options = GeoTiffOptions {
                compression: if compress {
                    TiffCompression::Deflate
                } else {
                    TiffCompression::None
                },
            };
            write_geotiff(&clipped, &output, Some(options)).context("Failed to write output")?;
            pb.finish_and_clear();
            done("Clipped raster", &output, elapsed);
        }
    }

    Ok(())
}
