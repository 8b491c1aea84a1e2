//! Statistics from the resume store
//!
//! Backs the `--stats` command: counts are read from the store and printed
//! without touching the network.

use crate::storage::{RunRecord, Storage, StorageResult, StoreStats};

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Row counts of the store
    pub counts: StoreStats,

    /// Most recent run, if any run was recorded
    pub latest_run: Option<RunRecord>,
}

impl CrawlStatistics {
    /// Pages discovered but not yet fetched
    pub fn unvisited(&self) -> u64 {
        self.counts.pages.saturating_sub(self.counts.visited)
    }

    /// Fraction of visited pages whose content was a duplicate
    pub fn duplicate_ratio(&self) -> f64 {
        if self.counts.visited == 0 {
            0.0
        } else {
            self.counts.duplicates as f64 / self.counts.visited as f64
        }
    }
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<CrawlStatistics> {
    Ok(CrawlStatistics {
        counts: storage.stats()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Pages:");
    println!("  Discovered: {}", stats.counts.pages);
    println!("  Visited: {}", stats.counts.visited);
    println!("  Not yet visited: {}", stats.unvisited());
    println!(
        "  Duplicates: {} ({:.1}% of visited)",
        stats.counts.duplicates,
        stats.duplicate_ratio() * 100.0
    );
    println!();

    println!("Store:");
    println!("  Pending frontier entries: {}", stats.counts.frontier);
    println!("  Content fingerprints: {}", stats.counts.fingerprints);
    println!("  Image manifest rows: {}", stats.counts.images);
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run (#{}):", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            println!(
                "  Finished: {}",
                run.finished_at.as_deref().unwrap_or("(not finished)")
            );
            println!("  Config hash: {}", run.config_hash);
        }
        None => println!("No crawl runs recorded."),
    }
}
