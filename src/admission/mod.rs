//! Admission control module
//!
//! Every fetch, page or image, passes through the controller of its host:
//! first the robots.txt policy, then the adaptive rate gate. Controllers are
//! created lazily by an [`AdmissionRegistry`] owned by the crawl.
//!
//! # Example
//!
//! ```no_run
//! use harvest_crawler::admission::{Admission, AdmissionRegistry, AdmissionSettings};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let registry = AdmissionRegistry::new(
//!     reqwest::Client::new(),
//!     AdmissionSettings {
//!         user_agent: "harvest-crawler/1.0 (+https://example.com/bot)".to_string(),
//!         default_delay: Duration::from_secs(1),
//!         robots_timeout: Duration::from_secs(20),
//!     },
//! );
//! let controller = registry.get("example.com");
//! let cancel = CancellationToken::new();
//! if controller.admit("https://example.com/", &cancel).await == Admission::Granted {
//!     // fetch, then report latency and status
//!     controller.record_response(Some(Duration::from_millis(120)), Some(200));
//! }
//! # }
//! ```

mod controller;
mod registry;

pub use controller::{Admission, AdmissionController, AdmissionSettings, HealthSnapshot};
pub use registry::AdmissionRegistry;
