//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching gated by per-host admission control
//! - HTML and sitemap parsing
//! - The breadth-first frontier
//! - Page jobs, background image downloads and shutdown handling
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod images;
mod job;
mod parser;
mod scheduler;
mod shutdown;
mod topic;

pub use coordinator::{run_crawl, Coordinator, CrawlReport};
pub use fetcher::{
    build_http_client, fetch_image_bytes, fetch_page, is_textual, ImageResponse, PageResponse,
};
pub use images::{ImageContext, ImageDrainReport, ImagePipeline};
pub use job::{process_url, JobContext, JobOutcome};
pub use parser::{parse_page, parse_sitemap, ParsedPage};
pub use scheduler::{Frontier, FrontierEntry};
pub use shutdown::listen_for_shutdown;
pub use topic::classify_topic;
