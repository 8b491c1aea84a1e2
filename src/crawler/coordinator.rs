//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Initializing storage, output logs and run tracking
//! - Seeding the frontier (start URL, resumed backlog, sitemap)
//! - Dispatching page jobs onto a bounded worker pool
//! - Applying discovered links breadth-first within the page budget
//! - The shutdown sequence that always persists state and flushes output

use crate::admission::{AdmissionRegistry, AdmissionSettings};
use crate::config::{compute_config_hash, Config};
use crate::crawler::fetcher::{build_http_client, fetch_page};
use crate::crawler::images::{ImageContext, ImagePipeline};
use crate::crawler::job::{process_url, record_failure, JobContext, JobOutcome};
use crate::crawler::parser::parse_sitemap;
use crate::crawler::scheduler::{Frontier, FrontierEntry};
use crate::crawler::shutdown::listen_for_shutdown;
use crate::dedup::DedupIndex;
use crate::output::{
    write_health_report, CsvLog, OutputLayout, IMAGE_MANIFEST_HEADER, PAGE_LOG_HEADER,
};
use crate::storage::{open_storage, RunStatus, Storage};
use crate::url::same_site;
use crate::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Number of persisted frontier entries loaded when resuming
const RESUME_BATCH: usize = 1000;

/// Timeout for the one-off sitemap request
const SITEMAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Synthetic parent recorded for URLs found in the sitemap
const SITEMAP_PARENT: &str = "sitemap";

/// Final counts of one crawl run
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlReport {
    pub run_id: i64,
    pub pages_processed: usize,
    pub duplicates: usize,
    pub images_saved: u64,
    pub frontier_remaining: usize,
    pub status: RunStatus,
}

/// Main crawler coordinator structure
///
/// Owns the frontier, the visited set and the primary job pool. Everything
/// shared with jobs lives in [`JobContext`].
pub struct Coordinator {
    config: Config,
    cancel: CancellationToken,
}

/// State of a run between setup and shutdown
struct Session {
    run_id: i64,
    ctx: Arc<JobContext>,
    image_log: Arc<CsvLog>,
    max_pages: usize,
    workers: usize,
    resume: bool,
    sitemap: bool,
    grace: Duration,
    frontier: Frontier,
    visited: HashSet<String>,
    jobs: JoinSet<JobOutcome>,
    in_flight: HashMap<Id, FrontierEntry>,
    pages_processed: usize,
    duplicates: usize,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// The configuration is expected to be validated already.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the crawl when cancelled
    ///
    /// Cancelling it has the same effect as a termination signal.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the crawl to completion
    ///
    /// Only setup failures (output directories, the store, the HTTP client)
    /// are returned as errors. Once the run row exists, every exit path goes
    /// through the shutdown sequence.
    pub async fn run(self) -> Result<CrawlReport> {
        let mut session = self.setup()?;
        info!("Starting crawl run {}", session.run_id);

        session.seed().await;
        let status = session.drain(&self.cancel).await;

        Ok(session.shut_down(status).await)
    }

    fn setup(&self) -> Result<Session> {
        let crawler = &self.config.crawler;
        let seed = Url::parse(&crawler.start_url)?;

        let layout = OutputLayout::create(&self.config.output.output_dir)?;
        let store: Arc<dyn Storage> =
            Arc::new(open_storage(&self.config.output.database_path())?);
        let run_id = store.create_run(&compute_config_hash(&self.config))?;

        match self.build_session(seed, layout, Arc::clone(&store), run_id) {
            Ok(session) => Ok(session),
            Err(e) => {
                error!("Crawl setup failed: {}", e);
                if let Err(e) = store.finish_run(run_id, RunStatus::Failed) {
                    warn!("Failed to close run {}: {}", run_id, e);
                }
                Err(e)
            }
        }
    }

    fn build_session(
        &self,
        seed: Url,
        layout: OutputLayout,
        store: Arc<dyn Storage>,
        run_id: i64,
    ) -> Result<Session> {
        let crawler = &self.config.crawler;
        let (page_log, image_log) = if crawler.resume {
            (
                CsvLog::open_append(&layout.page_log_path(), &PAGE_LOG_HEADER)?,
                CsvLog::open_append(&layout.image_manifest_path(), &IMAGE_MANIFEST_HEADER)?,
            )
        } else {
            store.reset_crawl_state()?;
            (
                CsvLog::create(&layout.page_log_path(), &PAGE_LOG_HEADER)?,
                CsvLog::create(&layout.image_manifest_path(), &IMAGE_MANIFEST_HEADER)?,
            )
        };
        let page_log = Arc::new(page_log);
        let image_log = Arc::new(image_log);

        let client = build_http_client(&self.config.user_agent)?;
        let registry = Arc::new(AdmissionRegistry::new(
            client.clone(),
            AdmissionSettings {
                user_agent: self.config.user_agent.header_value(),
                default_delay: crawler.default_delay(),
                robots_timeout: crawler.request_timeout(),
            },
        ));

        let images = Arc::new(ImagePipeline::new(
            crawler.image_workers,
            ImageContext {
                client: client.clone(),
                registry: Arc::clone(&registry),
                store: Arc::clone(&store),
                manifest: Arc::clone(&image_log),
                layout: layout.clone(),
                timeout: crawler.image_timeout(),
                cancel: self.cancel.clone(),
            },
        ));

        let ctx = Arc::new(JobContext {
            client,
            registry,
            dedup: DedupIndex::new(Arc::clone(&store)),
            store,
            page_log,
            layout,
            images,
            seed,
            max_depth: crawler.max_depth,
            allow_external: crawler.allow_external,
            request_timeout: crawler.request_timeout(),
            cancel: self.cancel.clone(),
        });

        Ok(Session {
            run_id,
            ctx,
            image_log,
            max_pages: crawler.max_pages,
            workers: crawler.workers.max(1),
            resume: crawler.resume,
            sitemap: crawler.sitemap,
            grace: crawler.grace_period(),
            frontier: Frontier::new(),
            visited: HashSet::new(),
            jobs: JoinSet::new(),
            in_flight: HashMap::new(),
            pages_processed: 0,
            duplicates: 0,
        })
    }
}

impl Session {
    // ===== SEEDING =====

    async fn seed(&mut self) {
        if self.resume {
            match self.ctx.store.pop_frontier_batch(RESUME_BATCH) {
                Ok(backlog) if !backlog.is_empty() => {
                    info!("Resuming with {} persisted frontier entries", backlog.len());
                    self.frontier.extend(backlog);
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to load persisted frontier, starting from seed: {}", e),
            }
        }

        if self.frontier.is_empty() {
            let seed = FrontierEntry::seed(self.ctx.seed.as_str());
            self.persist_pending(&seed);
            self.frontier.push(seed);
        }

        if self.sitemap {
            self.seed_from_sitemap().await;
        }

        info!("Frontier seeded with {} entries", self.frontier.len());
    }

    /// Enqueues URLs from `/sitemap.xml`; any failure is ignored
    async fn seed_from_sitemap(&mut self) {
        let ctx = Arc::clone(&self.ctx);
        let Some(gate) = ctx.registry.for_url(&ctx.seed) else {
            return;
        };
        let sitemap_url = format!("{}://{}/sitemap.xml", ctx.seed.scheme(), gate.host());

        let body = match fetch_page(&ctx.client, &gate, &sitemap_url, SITEMAP_TIMEOUT, &ctx.cancel).await
        {
            Some(response) if response.status.is_ok() => response.body,
            _ => None,
        };
        let Some(body) = body else {
            debug!("No sitemap at {}", sitemap_url);
            return;
        };

        let mut added = 0;
        for loc in parse_sitemap(&body) {
            let Ok(url) = Url::parse(&loc) else {
                continue;
            };
            if !matches!(url.scheme(), "http" | "https") {
                continue;
            }
            if !ctx.allow_external && !same_site(&url, &ctx.seed) {
                continue;
            }
            let entry = FrontierEntry::new(url.as_str(), 0, SITEMAP_PARENT);
            if self.frontier.contains(&entry.url) {
                continue;
            }
            self.persist_pending(&entry);
            self.frontier.push(entry);
            added += 1;
        }
        info!("Enqueued {} URLs from {}", added, sitemap_url);
    }

    // ===== DRAINING =====

    async fn drain(&mut self, cancel: &CancellationToken) -> RunStatus {
        let started = Instant::now();

        loop {
            if cancel.is_cancelled() {
                return RunStatus::Interrupted;
            }
            self.fill_slots();

            if self.jobs.is_empty() {
                if self.frontier.is_empty() {
                    info!("Frontier is empty, crawl complete");
                } else {
                    info!("Page budget of {} reached", self.max_pages);
                }
                return RunStatus::Completed;
            }

            let joined = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Shutdown requested - stopping submission of new tasks");
                    return RunStatus::Interrupted;
                }
                joined = self.jobs.join_next_with_id() => joined,
            };

            if let Some(joined) = joined {
                self.harvest(joined);
            }

            if self.pages_processed > 0 && self.pages_processed % 10 == 0 {
                let rate = self.pages_processed as f64 / started.elapsed().as_secs_f64().max(0.001);
                debug!(
                    "Progress: {} pages processed, {} in frontier, {:.2} pages/sec",
                    self.pages_processed,
                    self.frontier.len(),
                    rate
                );
            }
        }
    }

    /// Dispatches frontier entries until the pool or the budget is full
    fn fill_slots(&mut self) {
        while self.jobs.len() < self.workers && self.visited.len() < self.max_pages {
            let Some(entry) = self.frontier.pop() else {
                break;
            };
            if self.visited.contains(&entry.url) || entry.depth > self.ctx.max_depth {
                continue;
            }

            self.visited.insert(entry.url.clone());
            let ctx = Arc::clone(&self.ctx);
            let handle = self.jobs.spawn(process_url(ctx, entry.clone()));
            self.in_flight.insert(handle.id(), entry);
        }
    }

    /// Applies one finished job to the frontier and counters
    fn harvest(&mut self, joined: std::result::Result<(Id, JobOutcome), JoinError>) {
        let (entry, outcome) = match joined {
            Ok((id, outcome)) => match self.in_flight.remove(&id) {
                Some(entry) => (entry, outcome),
                None => return,
            },
            Err(e) => {
                if let Some(entry) = self.in_flight.remove(&e.id()) {
                    if e.is_panic() {
                        error!("Page job for {} panicked: {}", entry.url, e);
                        record_failure(&self.ctx.page_log, self.ctx.store.as_ref(), &entry);
                        self.pages_processed += 1;
                    } else {
                        self.requeue(entry);
                    }
                }
                return;
            }
        };

        match outcome {
            JobOutcome::Completed {
                duplicate, links, ..
            } => {
                self.pages_processed += 1;
                if duplicate {
                    self.duplicates += 1;
                }
                self.accept_links(links);
            }
            JobOutcome::Cancelled => self.requeue(entry),
            JobOutcome::Skipped => {}
        }
    }

    fn accept_links(&mut self, links: Vec<FrontierEntry>) {
        for link in links {
            if self.visited.len() >= self.max_pages {
                break;
            }
            if self.visited.contains(&link.url) || self.frontier.contains(&link.url) {
                continue;
            }
            if link.depth > self.ctx.max_depth {
                continue;
            }
            if !self.ctx.allow_external {
                match Url::parse(&link.url) {
                    Ok(url) if same_site(&url, &self.ctx.seed) => {}
                    _ => continue,
                }
            }
            self.frontier.push(link);
        }
    }

    /// Returns an undone entry to the head of the frontier
    fn requeue(&mut self, entry: FrontierEntry) {
        self.visited.remove(&entry.url);
        self.frontier.push_front(entry);
    }

    fn persist_pending(&self, entry: &FrontierEntry) {
        let store = &self.ctx.store;
        if let Err(e) = store
            .add_page(&entry.url, entry.depth, &entry.parent)
            .and_then(|_| store.add_frontier(entry))
        {
            warn!("Failed to persist frontier entry {}: {}", entry.url, e);
        }
    }

    // ===== SHUTTING_DOWN =====

    async fn shut_down(mut self, status: RunStatus) -> CrawlReport {
        info!("Finalizing: persisting state and closing resources");

        self.await_in_flight().await;

        let drained = self.ctx.images.drain(self.grace).await;
        if drained.aborted > 0 {
            warn!("{} image downloads did not finish", drained.aborted);
        }

        let remaining = self.frontier.drain();
        for entry in &remaining {
            self.persist_pending(entry);
        }
        if !remaining.is_empty() {
            info!("Saved {} frontier entries for resumption", remaining.len());
        }

        for log in [&self.ctx.page_log, &self.image_log] {
            if let Err(e) = log.close() {
                warn!("Failed to close {}: {}", log.path().display(), e);
            }
        }

        let snapshots = self.ctx.registry.snapshots();
        if let Err(e) = write_health_report(&self.ctx.layout.health_path(), &snapshots) {
            warn!("Failed to write domain health report: {}", e);
        }

        if let Err(e) = self.ctx.store.finish_run(self.run_id, status) {
            warn!("Failed to close run {}: {}", self.run_id, e);
        }

        info!(
            "Crawl {}: {} pages processed, {} duplicates, {} images saved, {} URLs left in frontier",
            status.to_db_string(),
            self.pages_processed,
            self.duplicates,
            drained.saved,
            remaining.len()
        );

        CrawlReport {
            run_id: self.run_id,
            pages_processed: self.pages_processed,
            duplicates: self.duplicates,
            images_saved: drained.saved,
            frontier_remaining: remaining.len(),
            status,
        }
    }

    /// Waits for in-flight jobs up to the grace period, then aborts them
    async fn await_in_flight(&mut self) {
        if self.jobs.is_empty() {
            return;
        }
        info!(
            "Waiting up to {:?} for {} in-flight page jobs",
            self.grace,
            self.jobs.len()
        );

        let deadline = tokio::time::Instant::now() + self.grace;
        loop {
            match tokio::time::timeout_at(deadline, self.jobs.join_next_with_id()).await {
                Ok(Some(joined)) => self.harvest(joined),
                Ok(None) => break,
                Err(_) => {
                    warn!("Grace period elapsed, aborting {} page jobs", self.jobs.len());
                    self.jobs.shutdown().await;
                    break;
                }
            }
        }

        // Aborted jobs go back to the frontier so they are persisted
        let aborted: Vec<FrontierEntry> = self.in_flight.drain().map(|(_, entry)| entry).collect();
        for entry in aborted {
            self.requeue(entry);
        }
    }
}

/// Runs the main crawl operation
///
/// Installs the termination signal listener, runs a [`Coordinator`] and
/// removes the listener again.
///
/// # Example
///
/// ```no_run
/// use harvest_crawler::config::load_config;
/// use harvest_crawler::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("crawl.toml"))?;
/// let report = run_crawl(config).await?;
/// println!("{} pages", report.pages_processed);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config) -> Result<CrawlReport> {
    let coordinator = Coordinator::new(config);
    let listener = listen_for_shutdown(coordinator.cancel_token());
    let result = coordinator.run().await;
    listener.abort();
    result
}
