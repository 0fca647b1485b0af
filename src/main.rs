//! Storefront Harvest main entry point
//!
//! This is the command-line interface for the two-stage store harvester.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use storefront_harvest::config::{load_config_with_hash, Backend, Config};
use storefront_harvest::crawler::{harvest_purchases, harvest_stores, RunSummary};
use storefront_harvest::output::{export_json, load_statistics, print_statistics};
use storefront_harvest::storage::SqliteStorage;
use tracing_subscriber::EnvFilter;

/// Storefront Harvest: a resumable, rate-limit-aware record harvester
///
/// Walks a store API one identifier at a time, then fetches the purchase
/// history of every store it found. Both stages can be interrupted and
/// rerun; they pick up where they stopped.
#[derive(Parser, Debug)]
#[command(name = "storefront-harvest")]
#[command(version)]
#[command(about = "A resumable, rate-limit-aware record harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk the store identifier space
    Stores,

    /// Fetch purchase history for every stored store
    Purchases,

    /// Validate the config and show what a run would do
    Check,

    /// Show record counts and checkpoint positions
    Stats,

    /// Dump the SQLite tables to JSON arrays
    Export {
        /// Destination for store records
        #[arg(long, value_name = "PATH")]
        stores: PathBuf,

        /// Destination for purchase-history records
        #[arg(long, value_name = "PATH")]
        purchases: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Stores => {
            let summary = harvest_stores(&config).await.context("store walk failed")?;
            report("Store walk", &summary);
        }
        Command::Purchases => {
            let summary = harvest_purchases(&config)
                .await
                .context("purchase-history join failed")?;
            report("Purchase-history join", &summary);
        }
        Command::Check => handle_check(&config, &config_hash),
        Command::Stats => {
            let stats = load_statistics(&config.output).context("failed to read statistics")?;
            print_statistics(&stats);
        }
        Command::Export { stores, purchases } => {
            handle_export(&config, &stores, purchases.as_deref())?;
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("storefront_harvest=info,warn"),
            1 => EnvFilter::new("storefront_harvest=debug,info"),
            2 => EnvFilter::new("storefront_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn report(stage: &str, summary: &RunSummary) {
    println!("{} stopped: {}", stage, summary.stop);
    println!("  Attempts: {}", summary.counters.attempts);
    println!("  Saved: {}", summary.counters.succeeded);
    println!("  Skipped: {}", summary.counters.skipped);
    println!("  Rate limited: {}", summary.counters.rate_limited);
    println!("  Write failures: {}", summary.counters.persist_failures);
    println!("  Checkpoint: {}", summary.checkpoint);
}

/// Handles `check`: prints the resolved plan without touching the network
fn handle_check(config: &Config, config_hash: &str) {
    println!("=== Storefront Harvest Check ===\n");

    println!("API:");
    println!(
        "  Store endpoint: {}/<id>?serviceSubtype=fine",
        config.api.store_base_url.trim_end_matches('/')
    );
    println!("  Purchase history endpoint: {}", config.api.purchase_history_url);
    println!("  Timeout: {}s", config.api.timeout_secs);
    println!("  Rate-limit statuses: {:?}", config.api.rate_limit_statuses);
    println!(
        "  Headers: {} store, {} purchase",
        config.api.store_headers.len(),
        config.api.purchase_headers.len()
    );

    println!("\nCrawler:");
    println!("  Initial backoff: {}s", config.crawler.initial_backoff_secs);
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);
    println!("  Start id: {}", config.crawler.start_id);
    match config.crawler.max_store_id {
        Some(max) => println!("  Max store id: {}", max),
        None => println!("  Max store id: unbounded"),
    }
    match config.crawler.max_rate_limit_retries {
        Some(max) => println!("  Rate-limit retries: {}", max),
        None => println!("  Rate-limit retries: unbounded"),
    }
    println!("  Merchant id path: {}", config.crawler.merchant_id_path);

    println!("\nOutput:");
    println!("  Backend: {:?}", config.output.backend);
    if let Some(path) = &config.output.database_path {
        println!("  Database: {}", path);
    }
    if let Some(path) = &config.output.stores_json_path {
        println!("  Stores JSON: {}", path);
    }
    if let Some(path) = &config.output.purchases_json_path {
        println!("  Purchases JSON: {}", path);
    }
    println!("  Store checkpoint: {}", config.output.store_checkpoint_path);
    println!("  Purchase checkpoint: {}", config.output.purchase_checkpoint_path);

    println!("\n✓ Configuration is valid (hash: {})", config_hash);
}

/// Handles `export`: dumps the SQLite tables to JSON
fn handle_export(config: &Config, stores: &Path, purchases: Option<&Path>) -> anyhow::Result<()> {
    if config.output.backend != Backend::Sqlite {
        bail!("export reads the sqlite backend; this config uses {:?}", config.output.backend);
    }
    let database = config
        .output
        .database_path
        .as_deref()
        .context("database-path is not configured")?;

    let storage = SqliteStorage::new(Path::new(database))
        .with_context(|| format!("failed to open {}", database))?;
    let counts = export_json(&storage, stores, purchases)?;

    println!("✓ Exported {} store records to {}", counts.stores, stores.display());
    if let (Some(count), Some(path)) = (counts.purchases, purchases) {
        println!("✓ Exported {} purchase records to {}", count, path.display());
    }
    Ok(())
}
