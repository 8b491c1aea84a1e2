//! HTML and sitemap parsing
//!
//! This module extracts from a page body:
//! - The visible text (one trimmed string per line)
//! - Outbound links from `<a href>`, absolutized and fragment-stripped
//! - Image URLs from `<img>` (`src`, then `data-src`, then `data-original`)
//!
//! Both functions are best-effort: malformed input yields whatever could be
//! recovered, never an error.

use crate::url::normalize_url;
use scraper::{Html, Node, Selector};
use sitemap::reader::{SiteMapEntity, SiteMapReader};
use std::collections::HashSet;
use std::io::Cursor;
use url::Url;

/// Elements whose text is never part of the visible page text
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "header", "footer", "svg", "meta", "link",
];

const IMAGE_SOURCE_ATTRS: &[&str] = &["src", "data-src", "data-original"];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    /// Visible text, one text node per line
    pub text: String,

    /// Unique outbound links in document order
    pub links: Vec<String>,

    /// Image URLs in document order
    pub images: Vec<String>,
}

/// Parses HTML content and extracts text, links and images
///
/// # Example
///
/// ```
/// use harvest_crawler::crawler::parse_page;
/// use url::Url;
///
/// let html = r#"<html><body><p>Hello</p><a href="/next#top">Next</a></body></html>"#;
/// let base = Url::parse("https://example.com/start").unwrap();
/// let parsed = parse_page(html, &base);
/// assert_eq!(parsed.text, "Hello\nNext");
/// assert_eq!(parsed.links, vec!["https://example.com/next".to_string()]);
/// ```
pub fn parse_page(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        text: visible_text(&document),
        links: extract_links(&document, base_url),
        images: extract_images(&document, base_url),
    }
}

/// Collects trimmed text nodes outside of non-content elements
fn visible_text(document: &Html) -> String {
    let mut parts = Vec::new();
    let mut stack = vec![document.tree.root()];

    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
                continue;
            }
            Node::Element(element) if SKIPPED_ELEMENTS.contains(&element.name()) => continue,
            Node::Element(_) | Node::Document | Node::Fragment => {}
            _ => continue,
        }

        // Reversed so the leftmost child is popped first
        let children: Vec<_> = node.children().collect();
        stack.extend(children.into_iter().rev());
    }

    parts.join("\n")
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if let Some(url) = normalize_url(base_url, href) {
                if seen.insert(url.clone()) {
                    links.push(url);
                }
            }
        }
    }

    links
}

fn extract_images(document: &Html, base_url: &Url) -> Vec<String> {
    let mut images = Vec::new();

    if let Ok(selector) = Selector::parse("img") {
        for element in document.select(&selector) {
            let source = IMAGE_SOURCE_ATTRS
                .iter()
                .filter_map(|attr| element.value().attr(attr))
                .find(|value| !value.trim().is_empty());
            if let Some(url) = source.and_then(|src| normalize_url(base_url, src)) {
                images.push(url);
            }
        }
    }

    images
}

/// Extracts every `<loc>` URL from a sitemap or sitemap index
///
/// Index entries are returned alongside page entries; nested sitemaps are
/// not fetched.
pub fn parse_sitemap(xml: &str) -> Vec<String> {
    let mut urls = Vec::new();

    for entity in SiteMapReader::new(Cursor::new(xml.as_bytes())) {
        let url = match entity {
            SiteMapEntity::Url(entry) => entry.loc.get_url(),
            SiteMapEntity::SiteMap(entry) => entry.loc.get_url(),
            // XML errors are not recoverable mid-document
            SiteMapEntity::Err(_) => break,
        };
        if let Some(url) = url {
            urls.push(url.to_string());
        }
    }

    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/dir/page").unwrap()
    }

    #[test]
    fn test_visible_text_skips_non_content() {
        let html = r#"
            <html>
              <head><title>Title</title><style>p { color: red }</style></head>
              <body>
                <header>Site header</header>
                <p>First  paragraph</p>
                <script>var x = 1;</script>
                <noscript>Enable JS</noscript>
                <div>Second <b>bold</b></div>
                <footer>Copyright</footer>
              </body>
            </html>
        "#;
        let parsed = parse_page(html, &base());
        assert_eq!(parsed.text, "Title\nFirst  paragraph\nSecond\nbold");
    }

    #[test]
    fn test_links_are_normalized_and_unique() {
        let html = r##"
            <a href="/a">A</a>
            <a href="b#frag">B</a>
            <a href="/a#other">A again</a>
            <a href="mailto:x@example.com">mail</a>
            <a href="javascript:void(0)">js</a>
            <a href="https://other.org/x">ext</a>
            <a>no href</a>
        "##;
        let parsed = parse_page(html, &base());
        assert_eq!(
            parsed.links,
            vec![
                "https://example.com/a",
                "https://example.com/dir/b",
                "https://other.org/x",
            ]
        );
    }

    #[test]
    fn test_image_source_fallbacks() {
        let html = r#"
            <img src="/logo.png">
            <img data-src="lazy.jpg">
            <img src="" data-original="/orig.gif">
            <img alt="no source">
            <img src="data:image/png;base64,AAAA">
        "#;
        let parsed = parse_page(html, &base());
        assert_eq!(
            parsed.images,
            vec![
                "https://example.com/logo.png",
                "https://example.com/dir/lazy.jpg",
                "https://example.com/orig.gif",
            ]
        );
    }

    #[test]
    fn test_malformed_html_is_best_effort() {
        let parsed = parse_page("<div><p>unclosed <a href='/x'>link", &base());
        assert_eq!(parsed.links, vec!["https://example.com/x"]);
        assert!(parsed.text.contains("unclosed"));
    }

    #[test]
    fn test_parse_sitemap() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/one</loc></url>
  <url><loc>https://example.com/two</loc></url>
</urlset>"#;
        assert_eq!(
            parse_sitemap(xml),
            vec!["https://example.com/one", "https://example.com/two"]
        );
    }

    #[test]
    fn test_parse_sitemap_garbage() {
        assert!(parse_sitemap("not xml at all").is_empty());
    }
}
