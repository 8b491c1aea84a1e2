//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared client with the crawler's user agent string
//! - Page and image fetches gated by the host's admission controller
//! - Latency and status feedback into the adaptive delay

use crate::admission::{Admission, AdmissionController};
use crate::config::UserAgentConfig;
use crate::state::PageStatus;
use reqwest::header::CONTENT_TYPE;
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const MAX_REDIRECTS: usize = 10;

/// Result of a page fetch
#[derive(Debug, Clone, PartialEq)]
pub struct PageResponse {
    pub status: PageStatus,
    pub content_type: String,
    /// Present only for 200 responses with a textual content type
    pub body: Option<String>,
}

impl PageResponse {
    fn without_body(status: PageStatus) -> Self {
        Self {
            status,
            content_type: String::new(),
            body: None,
        }
    }
}

/// Result of an image download
#[derive(Debug, Clone, PartialEq)]
pub struct ImageResponse {
    pub status: PageStatus,
    /// Present only for 200 responses
    pub bytes: Option<Vec<u8>>,
}

/// Builds an HTTP client with proper configuration
///
/// Timeouts are set per request, so pages and images can use different
/// limits on the same connection pool.
///
/// # Example
///
/// ```no_run
/// use harvest_crawler::config::UserAgentConfig;
/// use harvest_crawler::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Whether a Content-Type header names something worth parsing as a page
pub fn is_textual(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.is_empty() || ct.contains("html") || ct.contains("xml") || ct.starts_with("text/")
}

/// Admits, sends and times one GET request
///
/// Returns `None` when cancelled while waiting for the host's slot, and
/// `Some(Err(status))` when no response was received. Feedback for the
/// adaptive delay is recorded here in both the success and failure case.
async fn gated_get(
    client: &Client,
    gate: &AdmissionController,
    url: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Option<Result<Response, PageStatus>> {
    match gate.admit(url, cancel).await {
        Admission::Granted => {}
        Admission::Denied => {
            debug!("Blocked by robots: {}", url);
            return Some(Err(PageStatus::Denied));
        }
        Admission::Cancelled => return None,
    }

    let started = Instant::now();
    match client.get(url).timeout(timeout).send().await {
        Ok(response) => {
            gate.record_response(Some(started.elapsed()), Some(response.status().as_u16()));
            Some(Ok(response))
        }
        Err(e) => {
            gate.record_response(None, None);
            warn!("Exception fetching {}: {}", url, e);
            Some(Err(PageStatus::Transport))
        }
    }
}

/// Fetches a page through its host's admission controller
///
/// Returns `None` only when shutdown was requested before the request
/// started. Transport failures and timeouts yield status `0`, robots
/// refusals yield `denied`.
pub async fn fetch_page(
    client: &Client,
    gate: &AdmissionController,
    url: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Option<PageResponse> {
    let response = match gated_get(client, gate, url, timeout, cancel).await? {
        Ok(response) => response,
        Err(status) => return Some(PageResponse::without_body(status)),
    };

    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if status != StatusCode::OK || !is_textual(&content_type) {
        return Some(PageResponse {
            status: PageStatus::Http(status.as_u16()),
            content_type,
            body: None,
        });
    }

    let body = match response.bytes().await {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            warn!("Failed to read body of {}: {}", url, e);
            None
        }
    };

    Some(PageResponse {
        status: PageStatus::Http(status.as_u16()),
        content_type,
        body,
    })
}

/// Downloads image bytes through the image host's admission controller
pub async fn fetch_image_bytes(
    client: &Client,
    gate: &AdmissionController,
    url: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Option<ImageResponse> {
    let response = match gated_get(client, gate, url, timeout, cancel).await? {
        Ok(response) => response,
        Err(status) => return Some(ImageResponse { status, bytes: None }),
    };

    let status = response.status();
    if status != StatusCode::OK {
        return Some(ImageResponse {
            status: PageStatus::Http(status.as_u16()),
            bytes: None,
        });
    }

    let bytes = match response.bytes().await {
        Ok(bytes) => Some(bytes.to_vec()),
        Err(e) => {
            warn!("Failed to read image {}: {}", url, e);
            None
        }
    };

    Some(ImageResponse {
        status: PageStatus::Http(status.as_u16()),
        bytes,
    })
}
