use std::net::IpAddr;
use url::Url;

/// Second-level labels that act as part of a public suffix under a
/// two-letter country TLD (`example.co.uk`, `example.com.au`)
const SECOND_LEVEL_SUFFIXES: &[&str] = &["co", "com", "net", "org", "gov", "ac", "edu"];

/// Extracts the network authority (lowercase host plus explicit port)
///
/// This is the partition key for per-host admission control: two servers on
/// the same machine but different ports get separate politeness state.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use harvest_crawler::url::authority_of;
///
/// let url = Url::parse("http://EXAMPLE.com:8080/path").unwrap();
/// assert_eq!(authority_of(&url), Some("example.com:8080".to_string()));
///
/// let url = Url::parse("https://example.com/").unwrap();
/// assert_eq!(authority_of(&url), Some("example.com".to_string()));
/// ```
pub fn authority_of(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Like [`authority_of`] but for raw strings, as read back from CSV logs
pub fn authority_of_str(url: &str) -> Option<String> {
    Url::parse(url).ok().as_ref().and_then(authority_of)
}

/// Reduces a host to its registrable domain
///
/// IP addresses and single-label hosts are returned whole. Otherwise the
/// last two labels are kept, or the last three when the second-level label
/// is a known suffix component under a two-letter TLD.
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_start_matches('[').trim_end_matches(']').to_lowercase();
    if host.parse::<IpAddr>().is_ok() {
        return host;
    }

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let n = labels.len();
    if n <= 2 {
        return labels.join(".");
    }

    let tld = labels[n - 1];
    let second = labels[n - 2];
    let keep = if tld.len() == 2 && SECOND_LEVEL_SUFFIXES.contains(&second) {
        3
    } else {
        2
    };

    labels[n - keep..].join(".")
}

/// Returns true if both URLs share a registrable domain (ports ignored)
pub fn same_site(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(ha), Some(hb)) => registrable_domain(ha) == registrable_domain(hb),
        _ => false,
    }
}
