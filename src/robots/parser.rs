//! Robots.txt policy implementation
//!
//! Allow/deny matching is delegated to the robotstxt crate; the crawl-delay
//! directive, which that matcher ignores, is read by a small group-aware scan.

use robotstxt::DefaultMatcher;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Robots policy for one host
///
/// A policy built from an empty body, or with [`RobotsPolicy::allow_all`],
/// permits every URL and declares no crawl delay.
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    /// Raw robots.txt content
    content: String,
    allow_all: bool,
}

impl RobotsPolicy {
    /// Creates a policy from a fetched robots.txt body
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: content.trim().is_empty(),
        }
    }

    /// Creates a permissive policy that allows everything
    ///
    /// This is used when robots.txt cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    pub fn is_allow_all(&self) -> bool {
        self.allow_all
    }

    /// Checks if an absolute URL may be fetched by the given agent token
    ///
    /// A matcher panic on malformed input is treated as allow.
    pub fn is_allowed(&self, url: &str, agent: &str) -> bool {
        if self.allow_all {
            return true;
        }

        let content = self.content.as_str();
        catch_unwind(AssertUnwindSafe(|| {
            let mut matcher = DefaultMatcher::default();
            matcher.one_agent_allowed_by_robots(content, agent, url)
        }))
        .unwrap_or(true)
    }

    /// Gets the crawl delay in seconds declared for the agent
    ///
    /// A group naming the agent wins over the `*` group. Multiple
    /// consecutive `User-agent` lines share one group.
    pub fn crawl_delay(&self, agent: &str) -> Option<f64> {
        if self.allow_all {
            return None;
        }

        let agent = agent.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut reading_agents = false;
        let mut for_agent: Option<f64> = None;
        let mut for_wildcard: Option<f64> = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "user-agent" => {
                    if !reading_agents {
                        group.clear();
                        reading_agents = true;
                    }
                    if !value.is_empty() {
                        group.push(value.to_lowercase());
                    }
                }
                "crawl-delay" => {
                    reading_agents = false;
                    let delay = match value.parse::<f64>() {
                        Ok(d) if d.is_finite() && d >= 0.0 => d,
                        _ => continue,
                    };
                    if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                        for_agent.get_or_insert(delay);
                    } else if group.iter().any(|ua| ua == "*") {
                        for_wildcard.get_or_insert(delay);
                    }
                }
                _ => reading_agents = false,
            }
        }

        for_agent.or(for_wildcard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: &str = "harvest-crawler";

    #[test]
    fn test_allow_all() {
        let robots = RobotsPolicy::allow_all();
        assert!(robots.is_allow_all());
        assert!(robots.is_allowed("https://example.com/admin", BOT));
        assert_eq!(robots.crawl_delay(BOT), None);
    }

    #[test]
    fn test_empty_body_is_allow_all() {
        let robots = RobotsPolicy::from_content("  \n");
        assert!(robots.is_allow_all());
        assert!(robots.is_allowed("https://example.com/x", BOT));
    }

    #[test]
    fn test_disallow_everything() {
        let robots = RobotsPolicy::from_content("User-agent: *\nDisallow: /");
        assert!(!robots.is_allowed("https://example.com/", BOT));
        assert!(!robots.is_allowed("https://example.com/page", BOT));
    }

    #[test]
    fn test_disallow_prefix_with_allow_override() {
        let robots =
            RobotsPolicy::from_content("User-agent: *\nDisallow: /private\nAllow: /private/public");
        assert!(robots.is_allowed("https://example.com/", BOT));
        assert!(!robots.is_allowed("https://example.com/private/x", BOT));
        assert!(robots.is_allowed("https://example.com/private/public", BOT));
    }

    #[test]
    fn test_agent_specific_group() {
        let robots = RobotsPolicy::from_content(
            "User-agent: harvest-crawler\nDisallow: /\n\nUser-agent: *\nAllow: /",
        );
        assert!(!robots.is_allowed("https://example.com/page", BOT));
        assert!(robots.is_allowed("https://example.com/page", "otherbot"));
    }

    #[test]
    fn test_garbage_body_allows() {
        let robots = RobotsPolicy::from_content("This is not valid robots.txt {{{");
        assert!(robots.is_allowed("https://example.com/any/path", BOT));
    }

    #[test]
    fn test_crawl_delay_wildcard() {
        let robots = RobotsPolicy::from_content("User-agent: *\nCrawl-delay: 10\nDisallow: /admin");
        assert_eq!(robots.crawl_delay(BOT), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_prefers_named_group() {
        let robots = RobotsPolicy::from_content(
            "User-agent: *\nCrawl-delay: 10\n\nUser-agent: Harvest-Crawler\nCrawl-delay: 0.5",
        );
        assert_eq!(robots.crawl_delay(BOT), Some(0.5));
        assert_eq!(robots.crawl_delay("otherbot"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_shared_group() {
        let robots = RobotsPolicy::from_content("User-agent: a\nUser-agent: b\nCrawl-delay: 3");
        assert_eq!(robots.crawl_delay("a"), Some(3.0));
        assert_eq!(robots.crawl_delay("b"), Some(3.0));
        assert_eq!(robots.crawl_delay("c"), None);
    }

    #[test]
    fn test_crawl_delay_after_rules_starts_new_group() {
        let robots = RobotsPolicy::from_content(
            "User-agent: a\nDisallow: /x\nUser-agent: *\nCrawl-delay: 4",
        );
        // "a" is not part of the group carrying the delay, so it inherits
        // only through the wildcard
        assert_eq!(robots.crawl_delay("a"), Some(4.0));
    }

    #[test]
    fn test_crawl_delay_ignores_garbage_and_comments() {
        let robots = RobotsPolicy::from_content(
            "User-agent: * # everyone\nCrawl-delay: soon\nCrawl-delay: 2 # seconds",
        );
        assert_eq!(robots.crawl_delay(BOT), Some(2.0));
    }
}
