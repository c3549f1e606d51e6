//! Page-Harvester main entry point
//!
//! This is the command-line interface for the Page-Harvester paginated downloader.

use clap::{Parser, Subcommand};
use page_harvester::config::{load_config_with_hash, Config};
use page_harvester::crawler::load_param_sets;
use page_harvester::output::{
    load_statistics, print_statistics, print_status, scan_downloads, MetadataExporter,
};
use page_harvester::storage::{open_storage, MetadataStore};
use page_harvester::{ScrapingManager, SessionRecord};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Page-Harvester: a polite paginated page downloader
///
/// Page-Harvester fetches numbered or parameterized pages from one site,
/// saves each under a per-session directory, and records every fetch so that
/// sessions can be summarised and exported later.
#[derive(Parser, Debug)]
#[command(name = "page-harvester")]
#[command(version)]
#[command(about = "A polite paginated page downloader", long_about = None)]
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
    /// Fetch a run of numbered pages
    Scrape {
        /// Session name; pages are saved under <save-path>/<session>
        #[arg(short, long)]
        session: String,

        /// Number of pages to fetch
        #[arg(short, long)]
        pages: u32,

        /// First page number
        #[arg(long, default_value_t = 1)]
        start: u32,

        /// Skip all inter-page and retry delays
        #[arg(long)]
        no_delay: bool,
    },

    /// Fetch one page per parameter set from a TOML file of [[set]] tables
    Params {
        #[arg(short, long)]
        session: String,

        #[arg(short, long, value_name = "PARAMS")]
        file: PathBuf,

        #[arg(long)]
        no_delay: bool,
    },

    /// Show totals across every recorded session
    Stats,

    /// Write the CSV summary of every recorded page
    Export {
        /// Destination; defaults to <save-path>/<export-name>
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List session directories and their most recent files
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::debug!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Scrape {
            session,
            pages,
            start,
            no_delay,
        } => {
            if no_delay {
                config.delay.disable();
            }
            let mut manager = ScrapingManager::new(config, &config_hash)?;
            let result = manager.start_scraping_session(&session, pages, start).await;
            finish_session(&manager, result)?;
        }
        Command::Params {
            session,
            file,
            no_delay,
        } => {
            if no_delay {
                config.delay.disable();
            }
            let sets = load_param_sets(&file)?;
            tracing::info!("Loaded {} parameter sets from {}", sets.len(), file.display());

            let mut manager = ScrapingManager::new(config, &config_hash)?;
            let result = manager.start_parameterized_session(&session, &sets).await;
            finish_session(&manager, result)?;
        }
        Command::Stats => handle_stats(&config)?,
        Command::Export { output } => handle_export(&config, output)?,
        Command::Status => handle_status(&config)?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("page_harvester=info,warn"),
            1 => EnvFilter::new("page_harvester=debug,info"),
            2 => EnvFilter::new("page_harvester=trace,debug"),
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

/// Reports a finished session and refreshes the CSV summary
fn finish_session(
    manager: &ScrapingManager,
    result: page_harvester::Result<SessionRecord>,
) -> Result<(), Box<dyn std::error::Error>> {
    let record = match result {
        Ok(record) => record,
        Err(e) => {
            tracing::error!("Session failed: {}", e);
            return Err(e.into());
        }
    };

    println!(
        "Session '{}': {} attempted, {} succeeded, {} failed ({:.1}%)",
        record.name,
        record.attempted(),
        record.succeeded(),
        record.failed(),
        record.success_rate()
    );

    let totals = manager.get_total_stats()?;
    println!(
        "All sessions: {} pages saved of {} attempted",
        totals.succeeded, totals.attempted
    );

    let config = manager.config();
    let destination = config.scraper.save_path.join(&config.output.export_name);
    MetadataExporter::new(manager.store()).export_csv(&destination)?;

    Ok(())
}

/// Handles the stats command: shows statistics from the metadata store
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_storage(&config.scraper.save_path)?;
    let stats = load_statistics(&storage)?;
    let sessions = storage.load_sessions()?;

    print_statistics(&stats, &sessions);
    Ok(())
}

/// Handles the export command: writes the CSV summary
fn handle_export(
    config: &Config,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let destination =
        output.unwrap_or_else(|| config.scraper.save_path.join(&config.output.export_name));

    let storage = open_storage(&config.scraper.save_path)?;
    MetadataExporter::new(&storage).export_csv(&destination)?;

    println!("✓ Summary exported to: {}", destination.display());
    Ok(())
}

/// Handles the status command: lists downloaded pages per session
fn handle_status(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let sessions = scan_downloads(&config.scraper.save_path)?;
    print_status(&config.scraper.save_path, &sessions);
    Ok(())
}
