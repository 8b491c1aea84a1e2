//! Storage traits and error types
//!
//! This module defines the trait interface for the resume store and its
//! associated error types.

use crate::crawler::FrontierEntry;
use crate::state::PageStatus;
use crate::storage::{ImageRecord, PageRecord, RunRecord, RunStatus, StoreStats};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for the durable crawl state
///
/// Every method is atomic and may be called concurrently from any task;
/// implementations serialize writers internally.
pub trait Storage: Send + Sync {
    // ===== Run Management =====

    /// Creates a new crawl run and returns its ID
    fn create_run(&self, config_hash: &str) -> StorageResult<i64>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Closes a run with a final status and finish timestamp
    fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Clears pages, frontier, images and fingerprints (runs are kept)
    fn reset_crawl_state(&self) -> StorageResult<()>;

    // ===== Page Management =====

    /// Inserts an unvisited page row; existing rows are left untouched
    fn add_page(&self, url: &str, depth: u32, parent: &str) -> StorageResult<()>;

    /// Marks a page visited with its status and removes its frontier row
    fn mark_visited(&self, url: &str, status: PageStatus) -> StorageResult<()>;

    /// Gets a page by URL
    fn get_page(&self, url: &str) -> StorageResult<Option<PageRecord>>;

    // ===== Frontier Management =====

    /// Appends a pending entry; a URL already pending keeps its position
    ///
    /// URLs already marked visited are ignored.
    fn add_frontier(&self, entry: &FrontierEntry) -> StorageResult<()>;

    /// Removes and returns up to `limit` of the oldest pending entries
    fn pop_frontier_batch(&self, limit: usize) -> StorageResult<Vec<FrontierEntry>>;

    /// Number of pending entries
    fn frontier_len(&self) -> StorageResult<u64>;

    // ===== Content Fingerprints =====

    fn has_content_hash(&self, content_hash: &str) -> StorageResult<bool>;

    fn get_canonical_url_for_hash(&self, content_hash: &str) -> StorageResult<Option<String>>;

    /// Registers `url` as canonical for the hash unless another URL already
    /// is, and returns whichever URL is canonical afterwards
    fn register_content_hash(&self, content_hash: &str, url: &str) -> StorageResult<String>;

    /// Records that `url` has the same content as `canonical_url`
    fn mark_page_duplicate(
        &self,
        url: &str,
        content_hash: &str,
        canonical_url: &str,
    ) -> StorageResult<()>;

    // ===== Images =====

    /// Inserts or replaces the manifest row for an image URL
    fn add_image_manifest(&self, record: &ImageRecord) -> StorageResult<()>;

    fn get_image(&self, image_url: &str) -> StorageResult<Option<ImageRecord>>;

    // ===== Statistics =====

    fn stats(&self) -> StorageResult<StoreStats>;
}
