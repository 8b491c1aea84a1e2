//! One page fetch job
//!
//! A job fetches a single frontier entry through its host's admission
//! controller, records the outcome in the page log and the resume store,
//! runs content deduplication and hands accepted images and links back.

use crate::admission::AdmissionRegistry;
use crate::crawler::fetcher::fetch_page;
use crate::crawler::images::ImagePipeline;
use crate::crawler::parser::{parse_page, ParsedPage};
use crate::crawler::scheduler::FrontierEntry;
use crate::crawler::topic::classify_topic;
use crate::dedup::DedupIndex;
use crate::output::{save_text, CsvLog, OutputLayout, PageLogRow};
use crate::state::PageStatus;
use crate::storage::Storage;
use crate::url::{authority_of, same_site};
use crate::{CrawlError, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Shared, read-only context handed to every page job
pub struct JobContext {
    pub client: Client,
    pub registry: Arc<AdmissionRegistry>,
    pub store: Arc<dyn Storage>,
    pub dedup: DedupIndex,
    pub page_log: Arc<CsvLog>,
    pub layout: OutputLayout,
    pub images: Arc<ImagePipeline>,
    pub seed: Url,
    pub max_depth: u32,
    pub allow_external: bool,
    pub request_timeout: Duration,
    pub cancel: CancellationToken,
}

/// What a finished job reports back to the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The URL was fetched (or failed terminally) and is now visited
    Completed {
        status: PageStatus,
        duplicate: bool,
        links: Vec<FrontierEntry>,
    },
    /// Shutdown was requested before the request started
    Cancelled,
    /// The entry was beyond the depth limit and was not fetched
    Skipped,
}

impl JobOutcome {
    fn failed() -> Self {
        Self::Completed {
            status: PageStatus::Error,
            duplicate: false,
            links: Vec::new(),
        }
    }
}

/// Runs one job, containing every failure inside the job
///
/// An error is logged and recorded as a terminal `error` status for the URL.
pub async fn process_url(ctx: Arc<JobContext>, entry: FrontierEntry) -> JobOutcome {
    if ctx.cancel.is_cancelled() {
        debug!("Shutdown requested: skipping page processing: {}", entry.url);
        return JobOutcome::Cancelled;
    }
    if entry.depth > ctx.max_depth {
        return JobOutcome::Skipped;
    }

    match run_job(&ctx, &entry).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Error processing URL {}: {}", entry.url, e);
            record_failure(&ctx.page_log, ctx.store.as_ref(), &entry);
            JobOutcome::failed()
        }
    }
}

/// Writes the `error` row for a job that did not finish normally
pub(crate) fn record_failure(page_log: &CsvLog, store: &dyn Storage, entry: &FrontierEntry) {
    let row = PageLogRow {
        url: entry.url.clone(),
        status: PageStatus::Error.to_db_string(),
        depth: entry.depth,
        parent: entry.parent.clone(),
        topic: String::new(),
    };
    if let Err(e) = page_log.append(&row) {
        warn!("Failed to write page log row for {}: {}", entry.url, e);
    }
    if let Err(e) = store
        .add_page(&entry.url, entry.depth, &entry.parent)
        .and_then(|_| store.mark_visited(&entry.url, PageStatus::Error))
    {
        warn!("Failed to record failed page {}: {}", entry.url, e);
    }
}

async fn run_job(ctx: &JobContext, entry: &FrontierEntry) -> Result<JobOutcome> {
    let url = Url::parse(&entry.url)?;
    let gate = ctx.registry.for_url(&url).ok_or_else(|| CrawlError::Job {
        url: entry.url.clone(),
        message: "URL has no host".to_string(),
    })?;

    info!("Processing (depth={}): {}", entry.depth, entry.url);
    let Some(response) = fetch_page(
        &ctx.client,
        &gate,
        &entry.url,
        ctx.request_timeout,
        &ctx.cancel,
    )
    .await
    else {
        return Ok(JobOutcome::Cancelled);
    };

    let parsed = response
        .body
        .as_deref()
        .map(|body| parse_page(body, &url))
        .unwrap_or_default();

    record_visit(ctx, entry, response.status, &parsed);

    if response.body.is_none() {
        return Ok(JobOutcome::Completed {
            status: response.status,
            duplicate: false,
            links: Vec::new(),
        });
    }

    let duplicate = match ctx.dedup.check(&entry.url, &parsed.text) {
        Ok(outcome) => outcome.is_duplicate(),
        Err(e) => {
            warn!("Dedup check failed for {}: {}", entry.url, e);
            false
        }
    };

    if duplicate {
        debug!("Skipped saving duplicate page {}", entry.url);
    } else {
        keep_page(ctx, &url, &parsed).await;
    }

    Ok(JobOutcome::Completed {
        status: response.status,
        duplicate,
        links: accept_links(ctx, entry, &parsed.links),
    })
}

/// Page log row plus the visited mark in the store
fn record_visit(ctx: &JobContext, entry: &FrontierEntry, status: PageStatus, parsed: &ParsedPage) {
    let row = PageLogRow {
        url: entry.url.clone(),
        status: status.to_db_string(),
        depth: entry.depth,
        parent: entry.parent.clone(),
        topic: classify_topic(&parsed.text).to_string(),
    };
    if let Err(e) = ctx.page_log.append(&row) {
        warn!("Failed to write page log row for {}: {}", entry.url, e);
    }

    if let Err(e) = ctx
        .store
        .add_page(&entry.url, entry.depth, &entry.parent)
        .and_then(|_| ctx.store.mark_visited(&entry.url, status))
    {
        warn!("Failed to mark {} visited: {}", entry.url, e);
    }
}

/// Saves a canonical page's text and submits its images
async fn keep_page(ctx: &JobContext, url: &Url, parsed: &ParsedPage) {
    if let Err(e) = save_text(&ctx.layout.text_path(url.as_str()), &parsed.text).await {
        warn!("Failed to save text for {}: {}", url, e);
    }

    let page_authority = authority_of(url);
    for image in &parsed.images {
        if ctx.cancel.is_cancelled() {
            break;
        }
        if !ctx.allow_external {
            let image_authority = Url::parse(image).ok().as_ref().and_then(authority_of);
            if image_authority != page_authority {
                continue;
            }
        }
        ctx.images.submit(image, url.as_str());
    }
}

/// Filters extracted links and persists the accepted ones as pending
fn accept_links(ctx: &JobContext, entry: &FrontierEntry, links: &[String]) -> Vec<FrontierEntry> {
    let depth = entry.depth + 1;
    if depth > ctx.max_depth {
        return Vec::new();
    }

    let mut accepted = Vec::new();
    for link in links {
        if ctx.cancel.is_cancelled() {
            break;
        }
        let Ok(parsed) = Url::parse(link) else {
            continue;
        };
        if !ctx.allow_external && !same_site(&parsed, &ctx.seed) {
            continue;
        }
        // The store also refuses visited URLs; this only keeps them out of memory
        match ctx.store.get_page(link) {
            Ok(Some(page)) if page.visited => continue,
            Ok(_) => {}
            Err(e) => warn!("Failed to look up {}: {}", link, e),
        }

        let next = FrontierEntry::new(link.as_str(), depth, entry.url.as_str());
        if let Err(e) = ctx
            .store
            .add_page(&next.url, next.depth, &next.parent)
            .and_then(|_| ctx.store.add_frontier(&next))
        {
            warn!("Failed to persist frontier entry {}: {}", next.url, e);
        }
        accepted.push(next);
    }
    accepted
}
