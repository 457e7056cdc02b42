//! Benchmark CLI for the raster mosaic engine.

use clap::{Parser, Subcommand};
use mosaic_common::{BoundingBox, TimeSelection};
use mosaic_core::{OverviewPolicy, ReadRequest, ResolutionLevel};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mosaic-bench")]
#[command(about = "Benchmark and consistency checker for raster mosaics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark, from a scenario file or command-line settings
    Run {
        /// Path to scenario JSON file
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Build an NxN granule grid
        #[arg(short, long)]
        granules: Option<usize>,

        /// Number of reads
        #[arg(short, long)]
        requests: Option<u64>,

        /// Override concurrency level
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Granule loads in flight per read
        #[arg(short, long)]
        workers: Option<usize>,

        /// Run granule loads inline instead of on the worker pool
        #[arg(long)]
        inline: bool,

        /// RNG seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Skip the pooled vs inline comparison after the run
        #[arg(long)]
        skip_verify: bool,

        /// Output format: table (default), json, csv
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Compare pooled and inline execution on the same requests
    Verify {
        /// Path to scenario JSON file
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of reads
        #[arg(short, long, default_value = "100")]
        requests: u64,

        /// RNG seed
        #[arg(long, default_value = "1")]
        seed: u64,
    },

    /// Issue one read against the scenario mosaic and describe the result
    Read {
        /// Path to scenario JSON file
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Request box as min_x,min_y,max_x,max_y
        #[arg(short, long)]
        bbox: String,

        /// Output width and height in pixels; native resolution when omitted
        #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"])]
        size: Option<Vec<usize>>,

        /// Time slice (ISO-8601, or "latest")
        #[arg(short, long)]
        time: Option<String>,

        /// Overview policy: ignore, nearest, quality, speed
        #[arg(short, long)]
        policy: Option<String>,

        /// Blend overlapping granules instead of overlaying them
        #[arg(long)]
        blend: bool,
    },

    /// Show the level each overview policy picks
    Levels {
        /// Level resolutions, finest first (comma separated)
        #[arg(short, long, value_delimiter = ',', default_value = "1,2,4,8")]
        levels: Vec<f64>,

        /// Requested resolutions (comma separated)
        #[arg(short, long, value_delimiter = ',', default_value = "0.5,1,1.5,3,5,16")]
        requested: Vec<f64>,
    },
}

fn load_config(scenario: Option<PathBuf>) -> anyhow::Result<mosaic_bench::BenchConfig> {
    match scenario {
        Some(path) => {
            println!("Loading scenario: {}", path.display());
            mosaic_bench::BenchConfig::from_file(&path)
        }
        None => Ok(mosaic_bench::BenchConfig::default()),
    }
}

fn print_verify_report(report: &mosaic_bench::VerifyReport) -> anyhow::Result<()> {
    println!(
        "Compared {} reads ({} empty): {} mismatches",
        report.requests,
        report.empty,
        report.mismatches.len()
    );
    for mismatch in &report.mismatches {
        println!("  {}", mismatch);
    }
    if !report.mismatches.is_empty() {
        anyhow::bail!("pooled and inline execution disagree");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenario,
            granules,
            requests,
            concurrency,
            workers,
            inline,
            seed,
            skip_verify,
            output,
        } => {
            let mut config = load_config(scenario)?;

            // Apply overrides
            if let Some(n) = granules {
                config.grid_cols = n;
                config.grid_rows = n;
            }
            if let Some(r) = requests {
                config.requests = r;
            }
            if let Some(c) = concurrency {
                config.concurrency = c;
            }
            if let Some(w) = workers {
                config.workers = w;
            }
            if inline {
                config.pooling = false;
            }
            if seed.is_some() {
                config.seed = seed;
            }

            config.validate()?;

            println!("✓ Configuration loaded successfully");
            println!("  Name: {}", config.name);
            println!(
                "  Grid: {}x{} granules of {}px",
                config.grid_cols, config.grid_rows, config.granule_size
            );
            println!("  Overviews: {:?}", config.overviews);
            println!("  Requests: {}", config.requests);
            println!("  Concurrency: {}", config.concurrency);
            println!();

            let runner = mosaic_bench::BenchRunner::new(config);
            let results = runner.run().await?;
            let verification = if skip_verify {
                None
            } else {
                Some(runner.verify().await?)
            };

            match output.as_str() {
                "json" => {
                    println!("{}", mosaic_bench::ResultsReport::format_json(&results)?);
                }
                "csv" => {
                    println!("{}", mosaic_bench::ResultsReport::csv_header());
                    println!("{}", mosaic_bench::ResultsReport::format_csv(&results));
                }
                _ => {
                    println!("{}", mosaic_bench::ResultsReport::format_table(&results));
                }
            }

            match verification {
                Some(report) => print_verify_report(&report),
                None => Ok(()),
            }
        }
        Commands::Verify {
            scenario,
            requests,
            seed,
        } => {
            let mut config = load_config(scenario)?;
            config.requests = requests;
            config.seed = Some(seed);
            config.validate()?;

            let report = mosaic_bench::BenchRunner::new(config).verify().await?;
            print_verify_report(&report)
        }
        Commands::Read {
            scenario,
            bbox,
            size,
            time,
            policy,
            blend,
        } => {
            let config = load_config(scenario)?;
            config.validate()?;

            let mut request = ReadRequest::new(BoundingBox::from_bbox_string(&bbox)?);
            if let Some(&[width, height]) = size.as_deref() {
                request = request.with_size(width, height);
            }
            if let Some(time) = time {
                request = request.with_time(TimeSelection::parse(&time)?);
            }
            if let Some(policy) = policy {
                request = request.with_policy(OverviewPolicy::from_str(&policy));
            }
            if blend {
                request = request.blended();
            }

            let outcome = mosaic_bench::BenchRunner::new(config)
                .read_once(&request)
                .await?;
            println!("{}", mosaic_bench::ResultsReport::format_read(&outcome));
            Ok(())
        }
        Commands::Levels { levels, requested } => {
            let levels: Vec<ResolutionLevel> =
                levels.into_iter().map(ResolutionLevel::square).collect();
            println!(
                "{}",
                mosaic_bench::ResultsReport::format_levels(&levels, &requested)
            );
            Ok(())
        }
    }
}
