//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Page log and frontier persistence for resumption
//! - The content fingerprint to canonical URL map
//! - Image manifest and run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use std::path::Path;

/// Opens (creating if needed) the resume store at `path`
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Represents a page in the database
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub url: String,
    /// Empty until visited, then a [`crate::state::PageStatus`] string
    pub status: String,
    pub depth: u32,
    pub parent: String,
    pub visited: bool,
    pub content_hash: Option<String>,
    pub is_duplicate: bool,
    pub duplicate_of: String,
}

/// Represents an image manifest row
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub image_file: String,
    pub image_url: String,
    pub page_url: String,
    pub size_bytes: u64,
}

impl ImageRecord {
    /// Row written when an image is accepted, before it is downloaded
    pub fn placeholder(image_url: &str, page_url: &str) -> Self {
        Self {
            image_file: String::new(),
            image_url: image_url.to_string(),
            page_url: page_url.to_string(),
            size_bytes: 0,
        }
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Row counts of the resume store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub pages: u64,
    pub visited: u64,
    pub duplicates: u64,
    pub frontier: u64,
    pub images: u64,
    pub fingerprints: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Interrupted,
            RunStatus::Failed,
        ] {
            let db_str = status.to_db_string();
            assert_eq!(Some(*status), RunStatus::from_db_string(db_str));
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_image_placeholder() {
        let record = ImageRecord::placeholder("https://e.com/a.png", "https://e.com/");
        assert!(record.image_file.is_empty());
        assert_eq!(record.size_bytes, 0);
    }
}
