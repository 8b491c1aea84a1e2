use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for a crawl
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// URL the breadth-first traversal starts from
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Maximum number of pages to visit in one run
    #[serde(rename = "max-pages")]
    pub max_pages: usize,

    /// Maximum link depth from the start URL
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Follow links that leave the start URL's registrable domain
    #[serde(rename = "allow-external")]
    pub allow_external: bool,

    /// Number of concurrent page fetch jobs
    pub workers: usize,

    /// Number of concurrent image downloads
    #[serde(rename = "image-workers")]
    pub image_workers: usize,

    /// Continue from the frontier persisted by a previous run
    pub resume: bool,

    /// Seed the frontier from /sitemap.xml when available
    pub sitemap: bool,

    /// Time in-flight work is given to finish during shutdown (seconds)
    #[serde(rename = "graceful-shutdown-secs")]
    pub graceful_shutdown_secs: u64,

    /// Per-host delay used when robots.txt declares none (milliseconds)
    #[serde(rename = "default-delay-ms")]
    pub default_delay_ms: u64,

    /// Page request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Image request timeout (seconds)
    #[serde(rename = "image-timeout-secs")]
    pub image_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_url: String::new(),
            max_pages: 200,
            max_depth: 2,
            allow_external: false,
            workers: 10,
            image_workers: 4,
            resume: false,
            sitemap: true,
            graceful_shutdown_secs: 10,
            default_delay_ms: 1000,
            request_timeout_secs: 20,
            image_timeout_secs: 30,
        }
    }
}

impl CrawlerConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.graceful_shutdown_secs)
    }

    pub fn default_delay(&self) -> Duration {
        Duration::from_millis(self.default_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "harvest-crawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/bot".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving logs, texts, images and the resume store
    #[serde(rename = "output-dir")]
    pub output_dir: String,

    /// File name of the SQLite resume store inside the output directory
    #[serde(rename = "database-name")]
    pub database_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: "data".to_string(),
            database_name: "crawl_state.db".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir).join(&self.database_name)
    }
}
