//! Background image downloads
//!
//! Page jobs submit image URLs here and move on. Downloads run on their own
//! pool, bounded by a semaphore sized by `image-workers`, and go through the
//! same per-host admission controllers as pages.

use crate::admission::AdmissionRegistry;
use crate::crawler::fetcher::fetch_image_bytes;
use crate::output::{image_filename, save_binary, CsvLog, ImageManifestRow, OutputLayout};
use crate::state::PageStatus;
use crate::storage::{ImageRecord, Storage};
use reqwest::Client;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Everything an image job needs to fetch and record one image
pub struct ImageContext {
    pub client: Client,
    pub registry: Arc<AdmissionRegistry>,
    pub store: Arc<dyn Storage>,
    pub manifest: Arc<CsvLog>,
    pub layout: OutputLayout,
    pub timeout: Duration,
    pub cancel: CancellationToken,
}

struct PipelineState {
    closed: bool,
    seen: HashSet<String>,
    jobs: JoinSet<()>,
}

/// Counts reported when the pipeline is drained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageDrainReport {
    pub saved: u64,
    pub aborted: usize,
}

/// Bounded pool of image download jobs
pub struct ImagePipeline {
    ctx: Arc<ImageContext>,
    permits: Arc<Semaphore>,
    state: Mutex<PipelineState>,
    saved: Arc<AtomicU64>,
}

impl ImagePipeline {
    pub fn new(workers: usize, ctx: ImageContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            permits: Arc::new(Semaphore::new(workers.max(1))),
            state: Mutex::new(PipelineState {
                closed: false,
                seen: HashSet::new(),
                jobs: JoinSet::new(),
            }),
            saved: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queues an image for download
    ///
    /// Returns false when the pipeline is closed, shutdown was requested or
    /// the image URL was already submitted during this run. Accepted images
    /// get a placeholder manifest row in the store straight away.
    pub fn submit(&self, image_url: &str, page_url: &str) -> bool {
        if self.ctx.cancel.is_cancelled() {
            debug!("Shutdown requested: skipping image submission: {}", image_url);
            return false;
        }

        {
            let mut state = self.lock_state();
            if state.closed || !state.seen.insert(image_url.to_string()) {
                return false;
            }
        }

        // Store writes happen with the state lock released
        if let Err(e) = self
            .ctx
            .store
            .add_image_manifest(&ImageRecord::placeholder(image_url, page_url))
        {
            warn!("Failed to record image placeholder for {}: {}", image_url, e);
        }

        let mut state = self.lock_state();
        if state.closed {
            debug!("Pipeline closed before spawn: skipping image {}", image_url);
            return false;
        }

        // Reap finished jobs so the set does not grow with the whole run
        while let Some(result) = state.jobs.try_join_next() {
            log_join_result(result);
        }

        let ctx = Arc::clone(&self.ctx);
        let permits = Arc::clone(&self.permits);
        let saved = Arc::clone(&self.saved);
        let image_url = image_url.to_string();
        let page_url = page_url.to_string();
        state.jobs.spawn(async move {
            let _permit = tokio::select! {
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
                _ = ctx.cancel.cancelled() => return,
            };
            if download_image(&ctx, &image_url, &page_url).await {
                saved.fetch_add(1, Ordering::Relaxed);
            }
        });
        true
    }

    /// Number of images written to disk so far
    pub fn saved(&self) -> u64 {
        self.saved.load(Ordering::Relaxed)
    }

    /// Number of submitted jobs not yet reaped
    pub fn pending(&self) -> usize {
        self.lock_state().jobs.len()
    }

    /// Stops accepting submissions and waits for queued jobs
    ///
    /// Jobs still running after `grace` are aborted. Calling this more than
    /// once is harmless.
    pub async fn drain(&self, grace: Duration) -> ImageDrainReport {
        let mut jobs = {
            let mut state = self.lock_state();
            state.closed = true;
            std::mem::take(&mut state.jobs)
        };

        if !jobs.is_empty() {
            info!(
                "Shutting down image pipeline, waiting up to {:?} for {} jobs",
                grace,
                jobs.len()
            );
        }

        let finished = tokio::time::timeout(grace, async {
            while let Some(result) = jobs.join_next().await {
                log_join_result(result);
            }
        })
        .await;

        let aborted = jobs.len();
        if finished.is_err() {
            warn!("Image pipeline grace period elapsed, aborting {} jobs", aborted);
            jobs.shutdown().await;
        }

        ImageDrainReport {
            saved: self.saved(),
            aborted,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!("Image job panicked: {}", e);
        }
    }
}

/// Fetches and records one image; returns true when it was saved
async fn download_image(ctx: &ImageContext, image_url: &str, page_url: &str) -> bool {
    if ctx.cancel.is_cancelled() {
        debug!("Shutdown requested: aborting image job: {}", image_url);
        return false;
    }

    let Some(gate) = Url::parse(image_url)
        .ok()
        .and_then(|url| ctx.registry.for_url(&url))
    else {
        debug!("Image URL has no host: {}", image_url);
        return false;
    };

    let response =
        match fetch_image_bytes(&ctx.client, &gate, image_url, ctx.timeout, &ctx.cancel).await {
            Some(response) => response,
            None => return false,
        };

    let bytes = match (response.status, response.bytes) {
        (PageStatus::Http(200), Some(bytes)) if !bytes.is_empty() => bytes,
        (status, _) => {
            debug!("Image download failed: {} status={}", image_url, status);
            return false;
        }
    };

    let file_name = image_filename(image_url);
    let size_bytes = match save_binary(&ctx.layout.image_path(&file_name), &bytes).await {
        Ok(size) => size,
        Err(e) => {
            warn!("Failed to save image {}: {}", image_url, e);
            return false;
        }
    };

    let row = ImageManifestRow {
        image_file: file_name.clone(),
        image_url: image_url.to_string(),
        page_url: page_url.to_string(),
        size_bytes,
    };
    if let Err(e) = ctx.manifest.append(&row) {
        warn!("Failed to write manifest row for {}: {}", image_url, e);
    }

    let record = ImageRecord {
        image_file: file_name,
        image_url: image_url.to_string(),
        page_url: page_url.to_string(),
        size_bytes,
    };
    if let Err(e) = ctx.store.add_image_manifest(&record) {
        warn!("Failed to record image {}: {}", image_url, e);
    }

    debug!("Saved image {} ({} bytes)", image_url, size_bytes);
    true
}
