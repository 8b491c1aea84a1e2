//! Output module for crawl artifacts and reports
//!
//! This module handles:
//! - The output directory layout (page log, texts, images, health)
//! - Append-only CSV logs shared by concurrent jobs
//! - Deterministic file names for saved texts and images
//! - Post-hoc reports built from a finished output directory

mod csv_log;
mod files;
pub mod health;
pub mod link_graph;
pub mod stats;
pub mod summary;

pub use csv_log::{
    read_rows, CsvLog, ImageManifestRow, PageLogRow, IMAGE_MANIFEST_HEADER, PAGE_LOG_HEADER,
};
pub use files::{image_filename, safe_filename, save_binary, save_text};
pub use health::write_health_report;
pub use link_graph::{build_link_graph, export_link_graph, LinkGraph};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use summary::{generate_summary, CrawlSummary};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while writing or reading crawl artifacts
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Log already closed: {0}")]
    Closed(PathBuf),

    #[error("Missing input file: {0}")]
    MissingInput(PathBuf),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Directory layout of one crawl's output
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub base: PathBuf,
    pub urls_dir: PathBuf,
    pub texts_dir: PathBuf,
    pub images_dir: PathBuf,
}

impl OutputLayout {
    /// Describes the layout under `base` without touching the filesystem
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            urls_dir: base.join("urls"),
            texts_dir: base.join("texts"),
            images_dir: base.join("images"),
            base,
        }
    }

    /// Creates the layout's directories
    pub fn create(base: impl Into<PathBuf>) -> OutputResult<Self> {
        let layout = Self::new(base);
        for dir in [&layout.urls_dir, &layout.texts_dir, &layout.images_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(layout)
    }

    pub fn page_log_path(&self) -> PathBuf {
        self.urls_dir.join("urls.csv")
    }

    pub fn image_manifest_path(&self) -> PathBuf {
        self.images_dir.join("manifest.csv")
    }

    pub fn health_path(&self) -> PathBuf {
        self.base.join("domain_health.json")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.base.join("crawl_summary.json")
    }

    pub fn domain_report_path(&self) -> PathBuf {
        self.base.join("domain_report.csv")
    }

    pub fn link_graph_path(&self) -> PathBuf {
        self.base.join("link_graph.json")
    }

    pub fn text_path(&self, page_url: &str) -> PathBuf {
        self.texts_dir.join(safe_filename(page_url))
    }

    pub fn image_path(&self, file_name: &str) -> PathBuf {
        self.images_dir.join(file_name)
    }
}

/// Returns `path` if it exists, otherwise a `MissingInput` error
pub(crate) fn require_file(path: &Path) -> OutputResult<&Path> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(OutputError::MissingInput(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = OutputLayout::new("/tmp/out");
        assert_eq!(layout.page_log_path(), PathBuf::from("/tmp/out/urls/urls.csv"));
        assert_eq!(
            layout.image_manifest_path(),
            PathBuf::from("/tmp/out/images/manifest.csv")
        );
        assert_eq!(layout.health_path(), PathBuf::from("/tmp/out/domain_health.json"));
    }

    #[test]
    fn test_create_makes_directories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::create(dir.path().join("data")).unwrap();
        assert!(layout.urls_dir.is_dir());
        assert!(layout.texts_dir.is_dir());
        assert!(layout.images_dir.is_dir());
    }

    #[test]
    fn test_require_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.csv");
        assert!(matches!(
            require_file(&missing),
            Err(OutputError::MissingInput(_))
        ));
    }
}
