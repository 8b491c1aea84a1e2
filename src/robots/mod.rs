//! Robots.txt handling module
//!
//! This module fetches and interprets robots.txt for one host. Fetching never
//! fails: any transport problem yields an allow-all policy.

mod parser;

pub use parser::RobotsPolicy;

use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Fetches robots.txt for a host authority
///
/// The HTTPS origin is tried first, then HTTP. The first origin that answers
/// decides: a 200 body is parsed, any other status means no policy.
///
/// # Arguments
///
/// * `client` - Shared HTTP client carrying the crawler's user agent
/// * `authority` - Host plus optional port, e.g. `example.com:8080`
/// * `timeout` - Per-request timeout
pub async fn fetch_robots(client: &Client, authority: &str, timeout: Duration) -> RobotsPolicy {
    for scheme in ["https", "http"] {
        let robots_url = format!("{}://{}/robots.txt", scheme, authority);
        let response = match client.get(&robots_url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("robots.txt unavailable at {}: {}", robots_url, e);
                continue;
            }
        };

        if response.status() != StatusCode::OK {
            debug!("robots.txt at {} returned {}", robots_url, response.status());
            return RobotsPolicy::allow_all();
        }

        return match response.text().await {
            Ok(body) => RobotsPolicy::from_content(&body),
            Err(e) => {
                debug!("Failed to read robots.txt body from {}: {}", robots_url, e);
                RobotsPolicy::allow_all()
            }
        };
    }

    RobotsPolicy::allow_all()
}

/// Extracts the product token robots.txt groups are matched against
///
/// `harvest-crawler/1.0 (+https://example.com/bot)` becomes `harvest-crawler`.
pub fn agent_token(user_agent: &str) -> &str {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .filter(|token| !token.is_empty())
        .unwrap_or("*")
}
