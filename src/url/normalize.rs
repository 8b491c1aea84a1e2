use url::Url;

/// Link prefixes that never point at a crawlable document
const IGNORED_SCHEMES: &[&str] = &["javascript:", "mailto:", "data:", "tel:"];

/// Resolves a link found on a page into an absolute crawlable URL
///
/// # Normalization Steps
///
/// 1. Trim the raw attribute value; reject if empty
/// 2. Reject `javascript:`, `mailto:`, `data:` and `tel:` links
/// 3. Join the link against the page's base URL
/// 4. Remove the fragment (everything after #)
/// 5. Keep only http and https URLs that carry a host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use harvest_crawler::url::normalize_url;
///
/// let base = Url::parse("https://example.com/docs/").unwrap();
/// assert_eq!(
///     normalize_url(&base, "intro.html#top"),
///     Some("https://example.com/docs/intro.html".to_string())
/// );
/// assert_eq!(normalize_url(&base, "mailto:me@example.com"), None);
/// ```
pub fn normalize_url(base: &Url, link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }

    let lowered = link.to_ascii_lowercase();
    if IGNORED_SCHEMES.iter().any(|prefix| lowered.starts_with(prefix)) {
        return None;
    }

    let mut url = base.join(link).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.host_str()?;

    url.set_fragment(None);
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/section/page.html").unwrap()
    }

    #[test]
    fn test_relative_link_resolved() {
        assert_eq!(
            normalize_url(&base(), "other.html"),
            Some("https://example.com/section/other.html".to_string())
        );
        assert_eq!(
            normalize_url(&base(), "/root"),
            Some("https://example.com/root".to_string())
        );
        assert_eq!(
            normalize_url(&base(), "../up"),
            Some("https://example.com/up".to_string())
        );
    }

    #[test]
    fn test_remove_fragment() {
        assert_eq!(
            normalize_url(&base(), "https://example.com/a#frag"),
            Some("https://example.com/a".to_string())
        );
        // Pure fragment links collapse onto the page itself
        assert_eq!(
            normalize_url(&base(), "#top"),
            Some("https://example.com/section/page.html".to_string())
        );
    }

    #[test]
    fn test_ignored_schemes() {
        assert_eq!(normalize_url(&base(), "javascript:void(0)"), None);
        assert_eq!(normalize_url(&base(), "JavaScript:alert(1)"), None);
        assert_eq!(normalize_url(&base(), "mailto:someone@example.com"), None);
        assert_eq!(normalize_url(&base(), "tel:+15555555555"), None);
        assert_eq!(normalize_url(&base(), "data:image/png;base64,AAAA"), None);
    }

    #[test]
    fn test_non_http_schemes_rejected() {
        assert_eq!(normalize_url(&base(), "ftp://example.com/file"), None);
    }

    #[test]
    fn test_empty_link_rejected() {
        assert_eq!(normalize_url(&base(), ""), None);
        assert_eq!(normalize_url(&base(), "   "), None);
    }

    #[test]
    fn test_query_preserved() {
        assert_eq!(
            normalize_url(&base(), "/search?q=rust&page=2"),
            Some("https://example.com/search?q=rust&page=2".to_string())
        );
    }

    #[test]
    fn test_external_absolute_link() {
        assert_eq!(
            normalize_url(&base(), "  http://other.org/x  "),
            Some("http://other.org/x".to_string())
        );
    }
}
