use super::OutputResult;
use sha2::{Digest, Sha256};
use std::path::Path;
use url::Url;

const MAX_NAME_LEN: usize = 140;
const MAX_EXTENSION_LEN: usize = 5;
const DEFAULT_IMAGE_EXTENSION: &str = "jpg";

fn short_hash(input: &str, len: usize) -> String {
    let digest = hex::encode(Sha256::digest(input.as_bytes()));
    digest[..len].to_string()
}

/// Builds the text file name for a page URL
///
/// The name is the URL's authority and path with every run of characters
/// outside `[0-9A-Za-z._-]` replaced by `-`, capped at 140 characters, then
/// suffixed with 12 hex characters of the URL's hash so that URLs which
/// sanitize to the same stem still get distinct files.
pub fn safe_filename(url: &str) -> String {
    let stem_source = match Url::parse(url) {
        Ok(parsed) => {
            let mut netloc = parsed.host_str().unwrap_or_default().to_string();
            if let Some(port) = parsed.port() {
                netloc.push_str(&format!(":{}", port));
            }
            let path = parsed.path().trim_end_matches('/');
            let path = if path.is_empty() { "/" } else { path };
            format!("{}{}", netloc, path)
        }
        Err(_) => url.to_string(),
    };

    let mut name = String::with_capacity(stem_source.len());
    let mut in_run = false;
    for c in stem_source.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            name.push(c);
            in_run = false;
        } else if !in_run {
            name.push('-');
            in_run = true;
        }
    }

    let mut name = name.trim_matches('-').to_string();
    // Only ASCII survives sanitizing, so byte truncation is safe
    name.truncate(MAX_NAME_LEN);

    format!("{}-{}.txt", name, short_hash(url, 12))
}

/// Builds the file name for a downloaded image
///
/// The name is 16 hex characters of the URL's hash plus the path's extension
/// when it has one of at most five characters, `jpg` otherwise.
pub fn image_filename(image_url: &str) -> String {
    let path = Url::parse(image_url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();

    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| ext.len() <= MAX_EXTENSION_LEN && !ext.contains('/'))
        .filter(|ext| !ext.is_empty())
        .unwrap_or(DEFAULT_IMAGE_EXTENSION);

    format!("{}.{}", short_hash(image_url, 16), extension)
}

/// Writes a page's visible text
pub async fn save_text(path: &Path, text: &str) -> OutputResult<()> {
    tokio::fs::write(path, text.as_bytes()).await?;
    Ok(())
}

/// Writes downloaded bytes and returns the size on disk
pub async fn save_binary(path: &Path, data: &[u8]) -> OutputResult<u64> {
    tokio::fs::write(path, data).await?;
    let size = tokio::fs::metadata(path).await?.len();
    Ok(size)
}
