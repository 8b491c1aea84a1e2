use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use harvest_crawler::config::load_config;
///
/// let config = load_config(Path::new("crawl.toml")).unwrap();
/// println!("Max depth: {}", config.crawler.max_depth);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config = read_config(path)?;
    validate(&config)?;
    Ok(config)
}

/// Reads and parses a configuration file without validating it
///
/// The CLI uses this so flag overrides can fill in values (such as the
/// start URL) before validation runs.
pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses TOML configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the effective configuration
///
/// This is stored with each run so resumed runs can be compared against the
/// settings that produced the persisted state.
///
/// # Returns
///
/// Hex-encoded SHA-256 hash of the serialized configuration
pub fn compute_config_hash(config: &Config) -> String {
    let serialized = serde_json::to_string(config).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
start-url = "https://example.com/"
max-pages = 50
max-depth = 3
workers = 4
image-workers = 2
resume = true

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"

[output]
output-dir = "./out"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_pages, 50);
        assert_eq!(config.crawler.max_depth, 3);
        assert_eq!(config.crawler.workers, 4);
        assert!(config.crawler.resume);
        assert_eq!(config.user_agent.crawler_name, "TestCrawler");
        assert_eq!(config.output.output_dir, "./out");
        // Unspecified keys keep their defaults
        assert_eq!(config.output.database_name, "crawl_state.db");
        assert_eq!(config.crawler.default_delay_ms, 1000);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.crawler.max_pages, 200);
        assert_eq!(config.crawler.image_workers, 4);
        assert!(config.crawler.sitemap);
        assert_eq!(
            config.user_agent.header_value(),
            "harvest-crawler/1.0 (+https://example.com/bot)"
        );
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/crawl.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_without_start_url_fails_validation() {
        let file = create_temp_config("[crawler]\nmax-pages = 5\n");
        let result = load_config(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_config_hash_tracks_effective_values() {
        let mut a = Config::default();
        a.crawler.start_url = "https://example.com/".to_string();
        let mut b = a.clone();

        assert_eq!(compute_config_hash(&a), compute_config_hash(&b));
        assert_eq!(compute_config_hash(&a).len(), 64);

        b.crawler.max_pages = 7;
        assert_ne!(compute_config_hash(&a), compute_config_hash(&b));
    }
}
