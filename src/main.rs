//! lazyimg CLI - convert container image archives for lazy loading

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lazyimg::ops::{convert_image, ls_layer};
use lazyimg::{Config, ContentPool};

#[derive(Parser)]
#[command(name = "lazyimg")]
#[command(about = "convert a docker-save image archive into a lazy-loading image")]
#[command(version)]
#[command(subcommand_negates_reqs = true)]
struct Cli {
    /// image archive to convert, `<name>.tar`
    #[arg(required = true)]
    tarball: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, global = true, env = "LAZYIMG_CONFIG")]
    config: Option<PathBuf>,

    /// content pool directory
    #[arg(short, long, global = true)]
    pool: Option<PathBuf>,

    /// directory holding per-image work areas and the output archive
    #[arg(short, long, global = true)]
    work_dir: Option<PathBuf>,

    /// keep going when the source archive fails to extract
    #[arg(long, global = true)]
    lenient_extract: bool,

    /// debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// list the metadata tree of a converted layer archive
    Ls {
        /// converted `layer.tar`
        layer_tar: PathBuf,
    },

    /// verify every pooled blob against its name
    Fsck,

    /// show pool statistics
    Stats,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// load the config file if given, then apply command line overrides
fn load_config(cli: &Cli) -> lazyimg::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(pool) = &cli.pool {
        config.pool = pool.clone();
    }
    if let Some(work_dir) = &cli.work_dir {
        config.work_dir = Some(work_dir.clone());
    }
    if cli.lenient_extract {
        config.strict_extract = false;
    }
    Ok(config)
}

fn run(cli: Cli) -> lazyimg::Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Some(Commands::Ls { layer_tar }) => {
            for entry in ls_layer(&layer_tar, &config.metadata_name)? {
                println!("{}", entry);
            }
        }

        Some(Commands::Fsck) => {
            let pool = ContentPool::open(&config.pool)?;
            let report = pool.verify()?;

            println!("blobs checked: {}", report.blobs_checked);

            if !report.corrupt.is_empty() {
                println!("\ncorrupt blobs:");
                for blob in &report.corrupt {
                    println!("  {} (content hashes to {})", blob.expected, blob.actual);
                }
            }

            if report.is_ok() {
                println!("\npool is healthy");
            } else {
                println!("\npool has issues");
                return Err(lazyimg::Error::CorruptPool(report.corrupt.len()));
            }
        }

        Some(Commands::Stats) => {
            let pool = ContentPool::open(&config.pool)?;
            let stats = pool.stats()?;
            println!("pool: {}", pool.path().display());
            println!("blobs: {}", stats.blobs);
            println!("bytes: {}", stats.bytes);
        }

        None => {
            // clap enforces the positional when no subcommand is given
            if let Some(tarball) = cli.tarball {
                let report = convert_image(&tarball, &config)?;
                println!("{}", report.output.display());
            }
        }
    }

    Ok(())
}
