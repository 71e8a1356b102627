//! GeoDelta CLI - raster change detection and statistics

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geodelta_core::storage::MAX_IN_MEMORY;
use geodelta_core::algorithm::difference_geo_transform;
use geodelta_core::{AnyRaster, ArrayOptions, BandStatistics, Drivers, RasterMetadata};
use std::sync::Arc;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geodelta")]
#[command(author, version, about = "Raster differencing and statistics", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file mapping file extensions to driver names
    #[arg(long, global = true)]
    drivers: Option<PathBuf>,

    /// Largest band (in pixels) kept on the heap; bigger bands are file-backed
    #[arg(long, global = true, default_value_t = MAX_IN_MEMORY)]
    max_in_memory: u64,

    /// Directory for file-backed bands
    #[arg(long, global = true)]
    temp_dir: Option<PathBuf>,

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
    /// Per-channel statistics of a raster
    Stats {
        /// Input raster file
        input: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sample every channel at a ground coordinate
    Sample {
        /// Input raster file
        input: PathBuf,
        /// Ground X coordinate
        #[arg(allow_negative_numbers = true)]
        x: f64,
        /// Ground Y coordinate
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },
    /// Difference of two rasters over their shared extent
    Diff {
        /// First raster
        first: PathBuf,
        /// Second raster
        second: PathBuf,
        /// Output file
        output: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn load_drivers(path: Option<&Path>) -> Result<Drivers> {
    let Some(path) = path else {
        return Ok(Drivers::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read driver map {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid driver map {}", path.display()))
}

fn open_raster(path: &Path, drivers: &Drivers, options: &ArrayOptions) -> Result<AnyRaster> {
    let pb = spinner("Reading raster...");
    let raster = AnyRaster::open(path, drivers)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .with_options(options.clone());
    pb.finish_and_clear();
    info!(
        "Input: {} x {} x {} ({})",
        raster.columns(),
        raster.lines(),
        raster.channels(),
        raster.pixel_type()
    );
    Ok(raster)
}

fn load_pixels(raster: &mut AnyRaster) -> Result<()> {
    let pb = spinner("Loading pixels...");
    raster.load().context("Failed to load pixels")?;
    pb.finish_and_clear();
    Ok(())
}

fn print_band(channel: usize, stats: &BandStatistics) {
    println!("  Band {}: {} valid pixels", channel, stats.valid_count);
    if let (Some(min), Some(max)) = (stats.min, stats.max) {
        println!("    Min: {:.4}", min);
        println!("    Max: {:.4}", max);
    }
    if let Some(mean) = stats.mean {
        println!("    Mean: {:.4}", mean);
    }
    if let Some(std) = stats.std_dev() {
        println!("    Std dev: {:.4}", std);
    }
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let drivers = load_drivers(cli.drivers.as_deref())?;
    let options = ArrayOptions {
        max_in_memory: cli.max_in_memory,
        temp_dir: cli.temp_dir,
    };

    match cli.command {
        Commands::Info { input } => {
            let raster = open_raster(&input, &drivers, &options)?;

            println!("File: {}", input.display());
            println!(
                "Dimensions: {} x {} ({} channels)",
                raster.columns(),
                raster.lines(),
                raster.channels()
            );
            println!("Pixel type: {}", raster.pixel_type());
            match raster.metadata() {
                Some(md) => {
                    println!("Pixel size: {}", md.pixel_size());
                    println!(
                        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                        md.xmin(),
                        md.ymin(),
                        md.xmax(),
                        md.ymax()
                    );
                    println!("Projection: {}", md.projection());
                }
                None => println!("Not georeferenced"),
            }
            for (k, nodata) in raster.nodata_values().iter().enumerate() {
                println!("NoData band {}: {}", k + 1, nodata);
            }
        }

        Commands::Stats { input, json } => {
            let start = Instant::now();
            let mut raster = open_raster(&input, &drivers, &options)?;
            load_pixels(&mut raster)?;
            let stats = raster.statistics().context("Failed to compute statistics")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Statistics:");
                for (k, band) in stats.bands.iter().enumerate() {
                    print_band(k + 1, band);
                }
                println!("  Processing time: {:.2?}", start.elapsed());
            }
        }

        Commands::Sample { input, x, y } => {
            let raster = open_raster(&input, &drivers, &options)?;
            if !raster.contains_point((x, y)) {
                anyhow::bail!("({}, {}) lies outside {}", x, y, input.display());
            }

            let px = raster.sample_point((x, y)).context("Failed to sample")?;
            println!("Pixel: ({:.3}, {:.3})", px.x, px.y);
            if let Some(values) = px.values() {
                for (k, v) in values.iter().enumerate() {
                    println!("  Band {}: {}", k + 1, v);
                }
            }
            println!("Valid: {}", raster.is_valid(&px));
        }

        Commands::Diff {
            first,
            second,
            output,
        } => {
            let start = Instant::now();
            let a = open_raster(&first, &drivers, &options)?;
            let b = open_raster(&second, &drivers, &options)?;

            let pb = spinner("Computing difference...");
            let diff = a.compute_difference(&b).context("Failed to compute difference")?;
            pb.finish_and_clear();

            let Some(mut diff) = diff else {
                anyhow::bail!("{} and {} do not overlap", first.display(), second.display());
            };
            info!("Difference: {} x {}", diff.columns(), diff.lines());

            // the result has no geolocation of its own
            geolocate(&mut diff, &a, &b)?;

            let pb = spinner("Writing output...");
            diff.write(&output, &drivers)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            pb.finish_and_clear();
            done("Difference", &output, start.elapsed());
        }
    }

    Ok(())
}

/// Place a difference result on the first input's pixel grid, at the
/// upper-left pixel of the window cut from it
fn geolocate(diff: &mut AnyRaster, a: &AnyRaster, b: &AnyRaster) -> Result<()> {
    let (Some(a_md), Some(b_md)) = (a.metadata(), b.metadata()) else {
        anyhow::bail!("inputs are not georeferenced");
    };
    let gt = difference_geo_transform(a_md, b_md).context("inputs do not overlap")?;

    let md = RasterMetadata::from_geo_transform(&gt, diff.columns(), diff.lines(), a_md.projection())?;
    diff.set_metadata(Some(Arc::new(md)));
    Ok(())
}
