//! Harvest main entry point
//!
//! This is the command-line interface for the Harvest web crawler.

use anyhow::{bail, Context};
use clap::Parser;
use harvest_crawler::config::{read_config, validate, Config};
use harvest_crawler::crawler::run_crawl;
use harvest_crawler::output::{
    export_link_graph, generate_summary, load_statistics, print_statistics, OutputLayout,
};
use harvest_crawler::storage::{open_storage, Storage};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Harvest: a polite, resumable web crawler
///
/// Harvest crawls a site breadth-first while respecting robots.txt and
/// adapting its pace to each host, keeps one copy of each distinct page text,
/// downloads page images and can resume an interrupted crawl.
#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite, resumable web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// URL the crawl starts from
    #[arg(long)]
    start_url: Option<String>,

    /// Maximum number of pages to visit
    #[arg(long)]
    max_pages: Option<usize>,

    /// Maximum link depth from the start URL
    #[arg(long)]
    depth: Option<u32>,

    /// Follow links to other domains
    #[arg(long)]
    allow_external: bool,

    /// Number of concurrent page fetches
    #[arg(long)]
    workers: Option<usize>,

    /// Number of concurrent image downloads
    #[arg(long)]
    image_workers: Option<usize>,

    /// Continue from the frontier saved by a previous run
    #[arg(long)]
    resume: bool,

    /// Do not seed the frontier from /sitemap.xml
    #[arg(long)]
    no_sitemap: bool,

    /// Seconds in-flight work may take to finish on shutdown
    #[arg(long)]
    grace_secs: Option<u64>,

    /// Per-host delay when robots.txt declares none (milliseconds)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Output directory
    #[arg(long)]
    output: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "summary", "link_graph"])]
    dry_run: bool,

    /// Show statistics from the resume store and exit
    #[arg(long, conflicts_with_all = ["dry_run", "summary", "link_graph"])]
    stats: bool,

    /// Write crawl_summary.json and domain_report.csv from existing output and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "link_graph"])]
    summary: bool,

    /// Write link_graph.json from the page log and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "summary"])]
    link_graph: bool,
}

impl Cli {
    /// Loads the config file (or defaults) and applies flag overrides
    fn effective_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => read_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => Config::default(),
        };

        let crawler = &mut config.crawler;
        if let Some(start_url) = &self.start_url {
            crawler.start_url = start_url.clone();
        }
        if let Some(max_pages) = self.max_pages {
            crawler.max_pages = max_pages;
        }
        if let Some(depth) = self.depth {
            crawler.max_depth = depth;
        }
        if self.allow_external {
            crawler.allow_external = true;
        }
        if let Some(workers) = self.workers {
            crawler.workers = workers;
        }
        if let Some(image_workers) = self.image_workers {
            crawler.image_workers = image_workers;
        }
        if self.resume {
            crawler.resume = true;
        }
        if self.no_sitemap {
            crawler.sitemap = false;
        }
        if let Some(grace) = self.grace_secs {
            crawler.graceful_shutdown_secs = grace;
        }
        if let Some(delay) = self.delay_ms {
            crawler.default_delay_ms = delay;
        }
        if let Some(output) = &self.output {
            config.output.output_dir = output.clone();
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _log_guard = setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    let config = cli.effective_config()?;

    // Reporting modes work from existing output and need no start URL
    if cli.stats {
        return handle_stats(&config);
    }
    if cli.summary {
        return handle_summary(&config);
    }
    if cli.link_graph {
        return handle_link_graph(&config);
    }

    validate(&config).context("Invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// The returned guard flushes the log file and must live until exit.
fn setup_logging(
    verbose: u8,
    quiet: bool,
    log_file: Option<&Path>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let directives = if quiet {
        "error"
    } else {
        match verbose {
            0 => "harvest_crawler=info,harvest=info,warn",
            1 => "harvest_crawler=debug,harvest=debug,info",
            2 => "harvest_crawler=trace,harvest=trace,debug",
            _ => "trace",
        }
    };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_filter(EnvFilter::new(directives));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir,
                _ => Path::new("."),
            };
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file path has no file name: {}", path.display()))?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new(directives));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    let crawler = &config.crawler;
    println!("=== Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Start URL: {}", crawler.start_url);
    println!("  Max pages: {}", crawler.max_pages);
    println!("  Max depth: {}", crawler.max_depth);
    println!("  Allow external: {}", crawler.allow_external);
    println!("  Workers: {} pages, {} images", crawler.workers, crawler.image_workers);
    println!("  Resume: {}", crawler.resume);
    println!("  Sitemap: {}", crawler.sitemap);
    println!("  Default delay: {}ms", crawler.default_delay_ms);
    println!(
        "  Timeouts: {}s pages, {}s images, {}s shutdown grace",
        crawler.request_timeout_secs, crawler.image_timeout_secs, crawler.graceful_shutdown_secs
    );

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Directory: {}", config.output.output_dir);
    println!("  Database: {}", config.output.database_path().display());

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the resume store
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let db_path = config.output.database_path();
    if !db_path.is_file() {
        bail!("No resume store at {}", db_path.display());
    }

    println!("Database: {}\n", db_path.display());
    let storage = open_storage(&db_path)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --summary mode: aggregates the CSV logs and saved texts
fn handle_summary(config: &Config) -> anyhow::Result<()> {
    let layout = OutputLayout::new(&config.output.output_dir);

    let db_path = config.output.database_path();
    let store_duplicates = if db_path.is_file() {
        Some(open_storage(&db_path)?.stats()?.duplicates)
    } else {
        None
    };

    let summary = generate_summary(&layout, store_duplicates)?;

    println!("=== Crawl Summary ===\n");
    println!("Pages: {}", summary.pages_total);
    println!("Duplicates skipped: {}", summary.duplicates_skipped);
    println!("Images: {}", summary.images_total);
    println!("\n✓ Summary written to: {}", layout.summary_path().display());
    println!("✓ Domain report written to: {}", layout.domain_report_path().display());

    Ok(())
}

/// Handles the --link-graph mode: exports parent/child edges as JSON
fn handle_link_graph(config: &Config) -> anyhow::Result<()> {
    let layout = OutputLayout::new(&config.output.output_dir);
    let graph = export_link_graph(&layout)?;

    println!(
        "✓ Link graph with {} nodes and {} edges written to: {}",
        graph.nodes.len(),
        graph.edges.len(),
        layout.link_graph_path().display()
    );

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Starting crawl of {} (max pages: {}, max depth: {}, resume: {})",
        config.crawler.start_url,
        config.crawler.max_pages,
        config.crawler.max_depth,
        config.crawler.resume
    );

    match run_crawl(config).await {
        Ok(report) => {
            tracing::info!(
                "Crawl {} (run {}): {} pages processed",
                report.status.to_db_string(),
                report.run_id,
                report.pages_processed
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
