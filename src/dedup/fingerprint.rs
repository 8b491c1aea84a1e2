use sha2::{Digest, Sha256};

/// Fingerprint returned for text with no content
pub const EMPTY_FINGERPRINT: &str = "";

/// Lowercases and collapses every whitespace run into a single space
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Computes the content fingerprint of a page's visible text
///
/// The fingerprint is the hex SHA-256 of the normalized text, so pages that
/// differ only in case or whitespace share a fingerprint. Text that
/// normalizes to nothing yields [`EMPTY_FINGERPRINT`].
///
/// # Examples
///
/// ```
/// use harvest_crawler::fingerprint;
///
/// assert_eq!(
///     fingerprint("  Hello   World\n\nTest.  "),
///     fingerprint("hello world test.")
/// );
/// assert_eq!(fingerprint(""), "");
/// ```
pub fn fingerprint(text: &str) -> String {
    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return EMPTY_FINGERPRINT.to_string();
    }

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}
