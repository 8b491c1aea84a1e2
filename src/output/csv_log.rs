use super::{OutputError, OutputResult};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const PAGE_LOG_HEADER: [&str; 5] = ["url", "status", "depth", "parent", "topic"];
pub const IMAGE_MANIFEST_HEADER: [&str; 4] = ["image_file", "image_url", "page_url", "size_bytes"];

/// One row of `urls/urls.csv`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLogRow {
    pub url: String,
    pub status: String,
    pub depth: u32,
    pub parent: String,
    pub topic: String,
}

/// One row of `images/manifest.csv`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageManifestRow {
    pub image_file: String,
    pub image_url: String,
    pub page_url: String,
    pub size_bytes: u64,
}

/// CSV file appended to by many jobs
///
/// Each row is written and flushed under one lock, so rows never interleave
/// and a crash loses at most the row being written.
pub struct CsvLog {
    path: PathBuf,
    writer: Mutex<Option<csv::Writer<File>>>,
}

impl CsvLog {
    /// Creates (truncating) the file and writes its header
    pub fn create(path: &Path, header: &[&str]) -> OutputResult<Self> {
        let file = File::create(path)?;
        Self::with_file(path, file, Some(header))
    }

    /// Appends to an existing log, or creates it when missing or empty
    pub fn open_append(path: &Path, header: &[&str]) -> OutputResult<Self> {
        let has_content = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        if !has_content {
            return Self::create(path, header);
        }
        let file = OpenOptions::new().append(true).open(path)?;
        Self::with_file(path, file, None)
    }

    fn with_file(path: &Path, file: File, header: Option<&[&str]>) -> OutputResult<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if let Some(header) = header {
            writer.write_record(header)?;
            writer.flush()?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(Some(writer)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serializes one row and flushes it to disk
    pub fn append<T: Serialize>(&self, row: &T) -> OutputResult<()> {
        let mut guard = self.lock();
        let writer = guard
            .as_mut()
            .ok_or_else(|| OutputError::Closed(self.path.clone()))?;
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }

    /// Flushes and closes the file; later appends fail with `Closed`
    pub fn close(&self) -> OutputResult<()> {
        if let Some(mut writer) = self.lock().take() {
            writer.flush()?;
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<csv::Writer<File>>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reads every row of a CSV file with a header line
pub fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> OutputResult<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn page_row(url: &str) -> PageLogRow {
        PageLogRow {
            url: url.to_string(),
            status: "200".to_string(),
            depth: 1,
            parent: "https://e.com/".to_string(),
            topic: String::new(),
        }
    }

    #[test]
    fn test_header_written_on_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.csv");
        let log = CsvLog::create(&path, &PAGE_LOG_HEADER).unwrap();
        log.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "url,status,depth,parent,topic\n");
    }

    #[test]
    fn test_rows_are_flushed_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.csv");
        let log = CsvLog::create(&path, &PAGE_LOG_HEADER).unwrap();
        log.append(&page_row("https://e.com/a")).unwrap();

        // Still open, but the row is already on disk
        let rows: Vec<PageLogRow> = read_rows(&path).unwrap();
        assert_eq!(rows, vec![page_row("https://e.com/a")]);
    }

    #[test]
    fn test_append_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.csv");
        let log = CsvLog::create(&path, &IMAGE_MANIFEST_HEADER).unwrap();
        log.close().unwrap();
        log.close().unwrap();
        assert!(matches!(
            log.append(&ImageManifestRow::default()),
            Err(OutputError::Closed(_))
        ));
    }

    #[test]
    fn test_open_append_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.csv");

        let first = CsvLog::create(&path, &PAGE_LOG_HEADER).unwrap();
        first.append(&page_row("https://e.com/a")).unwrap();
        first.close().unwrap();

        let second = CsvLog::open_append(&path, &PAGE_LOG_HEADER).unwrap();
        second.append(&page_row("https://e.com/b")).unwrap();
        second.close().unwrap();

        let rows: Vec<PageLogRow> = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].url, "https://e.com/b");
    }

    #[test]
    fn test_open_append_creates_missing_file_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.csv");
        let log = CsvLog::open_append(&path, &PAGE_LOG_HEADER).unwrap();
        log.close().unwrap();
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .starts_with("url,status"));
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.csv");
        let log = Arc::new(CsvLog::create(&path, &PAGE_LOG_HEADER).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        log.append(&page_row(&format!("https://e.com/{}/{}", t, i)))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        log.close().unwrap();

        let rows: Vec<PageLogRow> = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 200);
        assert!(rows.iter().all(|r| r.status == "200" && r.depth == 1));
    }
}
