mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stampcache_core::{load_config, load_config_or_default, validate_config, CatalogCache, Config};

/// Command-line arguments for stampcache
#[derive(Parser, Debug)]
#[command(name = "stampcache")]
#[command(about = "Inspect and maintain the local stamp catalog cache")]
#[command(version)]
struct Args {
    /// Configuration file (defaults plus environment overrides when absent)
    #[arg(short, long, env = "STAMPCACHE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Show record counts, last refresh date and freshness
    Status,

    /// Replace cached data with the contents of JSON array files
    Import {
        /// Normalized catalog records
        #[arg(long)]
        normalized: PathBuf,

        /// Raw catalog items, projected on write
        #[arg(long)]
        raw: Option<PathBuf>,

        /// Record today as the last refresh date after importing
        #[arg(long)]
        mark_refreshed: bool,
    },

    /// Print one page of normalized records as JSON
    Page {
        #[arg(long, default_value_t = 0)]
        offset: u64,

        #[arg(long, default_value_t = 50)]
        limit: u64,
    },

    /// Remove cached records, keeping the refresh date
    Clear,

    /// Delete the cache database and recreate it empty
    Reset,
}

fn main() {
    if let Err(e) = run() {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Logs go to stderr so command output on stdout stays parseable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = resolve_config(args.config.as_deref())?;
    validate_config(&config).context("Configuration validation failed")?;
    info!("Database path: {:?}", config.database.path);

    let cache = CatalogCache::open(&config)
        .with_context(|| format!("Failed to open cache at {:?}", config.database.path))?;

    let report = cache.migration_report();
    if !report.is_complete() {
        warn!(
            failures = report.failures.len(),
            "Schema upgrade finished with skipped steps"
        );
    }

    let mut stdout = std::io::stdout().lock();
    commands::execute(&cache, &args.command, chrono::Utc::now(), &mut stdout)
}

fn resolve_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        None => load_config_or_default().context("Failed to load default configuration"),
    }
}
