//! Content deduplication module
//!
//! Pages are compared by a fingerprint of their visible text. The first URL
//! registered for a fingerprint becomes canonical; every other URL with the
//! same fingerprint is recorded as its duplicate.
//!
//! Canonical status is never revisited: if a canonical page later changes
//! content, pages already marked as its duplicates keep pointing at it.

mod fingerprint;

pub use fingerprint::{fingerprint, normalize_text, EMPTY_FINGERPRINT};

use crate::storage::{Storage, StorageResult};
use std::sync::Arc;
use tracing::info;

/// Dedup decision for one fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupOutcome {
    /// This URL owns the fingerprint
    Canonical { fingerprint: String },

    /// Another URL already owns the fingerprint
    Duplicate {
        fingerprint: String,
        canonical_url: String,
    },

    /// The page had no text to fingerprint
    Empty,
}

impl DedupOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// Fingerprint index backed by the resume store's content map
#[derive(Clone)]
pub struct DedupIndex {
    store: Arc<dyn Storage>,
}

impl DedupIndex {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    /// Decides whether `url` is canonical for `text` and records the result
    ///
    /// Registration is first-writer-wins and the canonical URL is always
    /// re-read after registering, so two jobs racing on the same new
    /// fingerprint agree on a single canonical URL.
    pub fn check(&self, url: &str, text: &str) -> StorageResult<DedupOutcome> {
        let fingerprint = fingerprint(text);
        if fingerprint == EMPTY_FINGERPRINT {
            return Ok(DedupOutcome::Empty);
        }

        let canonical_url = match self.store.get_canonical_url_for_hash(&fingerprint)? {
            Some(existing) => existing,
            None => self.store.register_content_hash(&fingerprint, url)?,
        };

        if canonical_url == url {
            return Ok(DedupOutcome::Canonical { fingerprint });
        }

        info!(
            "Duplicate content detected for {} (same as {})",
            url, canonical_url
        );
        self.store
            .mark_page_duplicate(url, &fingerprint, &canonical_url)?;
        Ok(DedupOutcome::Duplicate {
            fingerprint,
            canonical_url,
        })
    }
}
