//! URL handling module
//!
//! This module provides link normalization, host authority extraction and the
//! registrable-domain comparison used to keep a crawl on its seed site.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{authority_of, authority_of_str, registrable_domain, same_site};
pub use normalize::normalize_url;
