//! Sumi-Sieve main entry point
//!
//! This is the command-line interface for the Sumi-Sieve document harvester.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use sumi_sieve::config::{load_config_with_hash, Config};
use sumi_sieve::crawler::{build_connector, CrawlOptions};
use sumi_sieve::output::{drain_into, print_statistics, BatchSink, JsonlSink, RunStatistics};
use sumi_sieve::SyncMarker;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Sumi-Sieve: a web and forum document harvester
///
/// Sumi-Sieve walks a site, sitemap, URL list or forum from one seed,
/// refuses internal-network targets, cleans every page and writes the
/// resulting documents as JSON lines.
#[derive(Parser, Debug)]
#[command(name = "sumi-sieve")]
#[command(version)]
#[command(about = "A web and forum document harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Write documents to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Only emit forum posts newer than this RFC 3339 timestamp
    #[arg(long, value_name = "TIMESTAMP", conflicts_with = "first_run")]
    since: Option<String>,

    /// Emit every forum post regardless of age
    #[arg(long)]
    first_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let marker = sync_marker(cli.since.as_deref(), cli.first_run)?;
    handle_crawl(config, marker, cli.output).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so stdout can carry the document stream.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_sieve=info,warn"),
            1 => EnvFilter::new("sumi_sieve=debug,info"),
            2 => EnvFilter::new("sumi_sieve=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Builds the sync marker from the command-line flags
fn sync_marker(since: Option<&str>, first_run: bool) -> anyhow::Result<SyncMarker> {
    if first_run {
        return Ok(SyncMarker::first_run());
    }
    match since {
        Some(raw) => {
            let at = DateTime::parse_from_rfc3339(raw)
                .with_context(|| format!("invalid --since timestamp '{}'", raw))?;
            Ok(SyncMarker::since(at.with_timezone(&Utc)))
        }
        None => Ok(SyncMarker::default()),
    }
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    eprintln!("=== Sumi-Sieve Dry Run ===\n");

    eprintln!("Crawl Configuration:");
    eprintln!("  Seed: {}", config.crawl.seed_url);
    eprintln!("  Mode: {}", config.crawl.mode);
    eprintln!("  Batch size: {}", config.crawl.batch_size);
    eprintln!("  SSRF guard: {}", if config.crawl.enforce_ssrf_guard { "enforced" } else { "disabled" });
    eprintln!("  Boilerplate cleanup: {}", config.crawl.apply_boilerplate_cleanup);
    eprintln!("  Extra noise tags: {}", config.crawl.additional_noise_tags.join(", "));

    eprintln!("\nFetch:");
    eprintln!("  User agent: {}", config.fetch.user_agent);
    eprintln!("  Renderer: {:?}", config.fetch.renderer);
    eprintln!("  Request timeout: {}s", config.fetch.request_timeout_secs);
    eprintln!("  Navigation timeout: {}s", config.fetch.navigation_timeout_secs);
    eprintln!("  Extra headers: {}", config.fetch.extra_headers.len());

    if config.crawl.mode.is_forum() {
        eprintln!("\nForum Selectors:");
        eprintln!("  Page nav: {}", config.forum.page_nav_selector);
        eprintln!("  Thread title: {}", config.forum.thread_title_selector);
        eprintln!("  Title: {}", config.forum.title_selector);
        eprintln!("  Post: {}", config.forum.post_selector);
        eprintln!("  Post body: {}", config.forum.post_body_selector);
    }

    eprintln!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    marker: SyncMarker,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current page");
            interrupt.cancel();
        }
    });

    let connector = build_connector(
        &config,
        CrawlOptions {
            sync_marker: marker,
            cancel: Some(cancel.clone()),
        },
    )?;
    let next_marker = connector.next_sync_marker();
    tracing::info!("Starting {} connector ({})", connector.name(), config.crawl.mode);

    let writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let mut sink = JsonlSink::new(writer);
    let mut stats = RunStatistics::new();

    let result = drain_into(connector.produce(), &mut sink, &mut stats).await;
    if let Err(e) = sink.finish() {
        tracing::warn!("Failed to flush output: {}", e);
    }
    tracing::debug!("{} documents written", sink.written());

    match result {
        Ok(()) => {
            tracing::info!("Crawl completed successfully");
            // An interrupted run must not advance the sync marker
            let next_marker = next_marker.filter(|_| !cancel.is_cancelled());
            print_statistics(&stats, next_marker.as_ref());
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
