//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageStatus`: Terminal outcome recorded for every visited page
//! - `DomainState`: Per-host pacing state driving the adaptive rate gate

mod domain_state;
mod page_state;

// Re-export main types
pub use domain_state::{
    DomainState, BACKOFF_FACTOR, LATENCY_WINDOW, MAX_DELAY, MIN_DELAY, RECOVERY_FACTOR,
};
pub use page_state::PageStatus;
