//! qa-archiver main entry point
//!
//! This is the command-line interface for archiving Q&A profile histories.

use anyhow::Context;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use qa_archiver::config::{load_config_or_default, Config};
use qa_archiver::crawler::{parse_timestamp, run_crawl, CrawlOptions};
use qa_archiver::output::{generate_markdown, load_statistics, print_statistics};
use qa_archiver::storage::open_storage;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// qa-archiver: an incremental archiver for Q&A profiles
///
/// Crawls a profile's answers newest to oldest, stores them in SQLite with
/// deduplicated media, and exports the archive as Markdown.
#[derive(Parser, Debug)]
#[command(name = "qa-archiver")]
#[command(version)]
#[command(about = "An incremental archiver for Q&A profiles", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a profile and store new answers
    Archive {
        /// Profile to archive
        #[arg(short, long)]
        user: String,

        /// Page cursor to resume from
        #[arg(short, long)]
        page: Option<String>,

        /// Stop at answers on or before this time (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)
        #[arg(short, long, value_parser = parse_stop_at)]
        stop_at: Option<DateTime<Utc>>,

        /// Output directory for visuals and dumps (overrides the config)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Export archived answers as Markdown
    Markdown {
        /// Profile to export
        #[arg(short, long)]
        user: String,

        /// Output directory (overrides the config)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show archive statistics for a profile
    Stats {
        /// Profile to report on
        #[arg(short, long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load_config_or_default(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Invalid default configuration".to_string(),
    })?;

    match cli.command {
        Command::Archive {
            user,
            page,
            stop_at,
            out,
        } => handle_archive(&config, &user, page, stop_at, out).await,
        Command::Markdown { user, out } => handle_markdown(&config, &user, out),
        Command::Stats { user } => handle_stats(&config, &user),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("qa_archiver=info,warn"),
            1 => EnvFilter::new("qa_archiver=debug,info"),
            2 => EnvFilter::new("qa_archiver=trace,debug"),
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

/// Accepts a bare date (midnight UTC) or a full timestamp
fn parse_stop_at(value: &str) -> Result<DateTime<Utc>, String> {
    if let Some(ts) = parse_timestamp(value) {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| format!("`{}` is not a date or timestamp", value))
}

fn output_dir(config: &Config, out: Option<PathBuf>) -> PathBuf {
    out.unwrap_or_else(|| PathBuf::from(&config.output.output_dir))
}

/// Handles the archive subcommand
async fn handle_archive(
    config: &Config,
    user: &str,
    page: Option<String>,
    stop_at: Option<DateTime<Utc>>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let options = CrawlOptions::new(user, output_dir(config, out))
        .with_resume_cursor(page)
        .with_stop_before(stop_at);

    tracing::info!("Database: {}", config.output.database_path);
    if let Some(stop_at) = options.stop_before {
        tracing::info!("Stopping at answers on or before {}", stop_at);
    }

    let result = run_crawl(config, options).await?;

    println!("Records written: {}", result.records_written);
    println!("Extracted: {}", result.progress);
    println!("Stopped: {}", result.stop_reason);
    if result.warnings > 0 {
        println!("Extraction warnings: {}", result.warnings);
    }
    if let Some(cursor) = &result.last_cursor {
        println!("Resume with: --page {}", cursor);
    }

    if let Some(e) = result.error {
        tracing::error!("Crawl failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}

/// Handles the markdown subcommand
fn handle_markdown(config: &Config, user: &str, out: Option<PathBuf>) -> anyhow::Result<()> {
    let owner_id = user.trim().to_lowercase();
    let dir = output_dir(config, out);

    // Normalizes a missing trailing slash so permalinks concatenate cleanly
    let base_url = url::Url::parse(&config.crawler.base_url)?;

    let mut storage = open_storage(Path::new(&config.output.database_path))?;
    let report = generate_markdown(&mut storage, &owner_id, &dir, base_url.as_str())
        .with_context(|| format!("Markdown export for {} failed", owner_id))?;

    if report.records_exported == 0 {
        println!("Nothing to generate.");
    } else {
        println!(
            "Exported {} answers into {} files in {}",
            report.records_exported,
            report.files.len(),
            dir.display()
        );
    }
    Ok(())
}

/// Handles the stats subcommand
fn handle_stats(config: &Config, user: &str) -> anyhow::Result<()> {
    let owner_id = user.trim().to_lowercase();
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage, &owner_id)?;
    print_statistics(&stats);

    Ok(())
}
