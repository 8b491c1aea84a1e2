//! Post-hoc crawl summary
//!
//! Reads a finished output directory and writes `crawl_summary.json` plus a
//! per-domain `domain_report.csv`. Missing inputs count as empty so a summary
//! can be produced for a run that was interrupted early.

use super::csv_log::read_rows;
use super::{OutputLayout, OutputResult};
use crate::url::authority_of_str;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

const TOP_DOMAINS: usize = 20;

type CsvRow = HashMap<String, String>;

/// Length statistics over the saved text files
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TextStats {
    pub page_text_count: u64,
    pub total_text_chars: u64,
    pub avg_text_len: f64,
    pub min_text_len: Option<u64>,
    pub max_text_len: Option<u64>,
}

/// Contents of `crawl_summary.json`
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub pages_total: u64,
    pub duplicates_skipped: u64,
    pub status_counts: BTreeMap<String, u64>,
    pub topics: BTreeMap<String, u64>,
    #[serde(flatten)]
    pub text: TextStats,
    pub images_total: u64,
    /// `[domain, count]` pairs, most frequent first
    pub top_domains: Vec<(String, u64)>,
}

/// Orders counts descending, breaking ties by key
pub(crate) fn rank_counts(counts: HashMap<String, u64>) -> Vec<(String, u64)> {
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

fn read_optional_rows(path: &Path) -> OutputResult<Vec<CsvRow>> {
    if !path.is_file() {
        debug!("{} not found, treating as empty", path.display());
        return Ok(Vec::new());
    }
    read_rows(path)
}

fn field<'a>(row: &'a CsvRow, name: &str) -> &'a str {
    row.get(name).map(|v| v.trim()).unwrap_or_default()
}

fn is_truthy(value: &str) -> bool {
    !matches!(value, "" | "0" | "false" | "False")
}

/// Collects length statistics over `*.txt` files in `texts_dir`
pub fn collect_text_stats(texts_dir: &Path) -> OutputResult<TextStats> {
    let mut stats = TextStats::default();
    if !texts_dir.is_dir() {
        return Ok(stats);
    }

    for entry in std::fs::read_dir(texts_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Skipping unreadable text file {}: {}", path.display(), e);
                continue;
            }
        };
        let len = String::from_utf8_lossy(&bytes).chars().count() as u64;

        stats.page_text_count += 1;
        stats.total_text_chars += len;
        stats.min_text_len = Some(stats.min_text_len.map_or(len, |m| m.min(len)));
        stats.max_text_len = Some(stats.max_text_len.map_or(len, |m| m.max(len)));
    }

    if stats.page_text_count > 0 {
        stats.avg_text_len = stats.total_text_chars as f64 / stats.page_text_count as f64;
    }
    Ok(stats)
}

/// Builds the summary from page log rows, image rows and text statistics
///
/// `store_duplicates`, when known, replaces the count derived from an
/// `is_duplicate` log column, which the crawler's own page log does not carry.
pub fn summarize(
    pages: &[CsvRow],
    images_total: u64,
    text: TextStats,
    store_duplicates: Option<u64>,
) -> (CrawlSummary, Vec<(String, u64)>) {
    let mut status_counts = BTreeMap::new();
    let mut topics = BTreeMap::new();
    let mut domains: HashMap<String, u64> = HashMap::new();
    let mut csv_duplicates = 0;

    for row in pages {
        let status = field(row, "status");
        if !status.is_empty() {
            *status_counts.entry(status.to_string()).or_insert(0) += 1;
        }

        let topic = field(row, "topic");
        if !topic.is_empty() {
            *topics.entry(topic.to_string()).or_insert(0) += 1;
        }

        if is_truthy(field(row, "is_duplicate")) {
            csv_duplicates += 1;
        }

        if let Some(domain) = authority_of_str(field(row, "url")) {
            *domains.entry(domain).or_insert(0) += 1;
        }
    }

    let ranked = rank_counts(domains);
    let summary = CrawlSummary {
        pages_total: pages.len() as u64,
        duplicates_skipped: store_duplicates.unwrap_or(csv_duplicates),
        status_counts,
        topics,
        text,
        images_total,
        top_domains: ranked.iter().take(TOP_DOMAINS).cloned().collect(),
    };
    (summary, ranked)
}

/// Generates `crawl_summary.json` and `domain_report.csv` for an output directory
pub fn generate_summary(
    layout: &OutputLayout,
    store_duplicates: Option<u64>,
) -> OutputResult<CrawlSummary> {
    let pages = read_optional_rows(&layout.page_log_path())?;
    let images = read_optional_rows(&layout.image_manifest_path())?;
    let text = collect_text_stats(&layout.texts_dir)?;

    let (summary, domains) = summarize(&pages, images.len() as u64, text, store_duplicates);

    let writer = BufWriter::new(File::create(layout.summary_path())?);
    serde_json::to_writer_pretty(writer, &summary)?;

    let mut report = csv::Writer::from_path(layout.domain_report_path())?;
    report.write_record(["domain", "count"])?;
    for (domain, count) in &domains {
        report.write_record([domain.clone(), count.to_string()])?;
    }
    report.flush()?;

    info!(
        "Summary written: pages_total={}, images={}",
        summary.pages_total, summary.images_total
    );
    Ok(summary)
}
