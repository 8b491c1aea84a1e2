//! Harvest: a polite, resumable web crawler
//!
//! This crate implements a breadth-first crawler that respects robots.txt and
//! adapts its per-host pacing, deduplicates pages by content fingerprint,
//! downloads embedded images out-of-band and persists its traversal state so
//! an interrupted crawl can be resumed.

pub mod admission;
pub mod config;
pub mod crawler;
pub mod dedup;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Job for {url} failed: {message}")]
    Job { url: String, message: String },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

// Re-export commonly used types
pub use admission::{AdmissionController, AdmissionRegistry, HealthSnapshot};
pub use config::Config;
pub use crawler::{run_crawl, Coordinator, CrawlReport};
pub use dedup::{fingerprint, DedupIndex, DedupOutcome};
pub use state::{DomainState, PageStatus};
pub use storage::{SqliteStorage, Storage};
