//! Per-host admission control
//!
//! An [`AdmissionController`] answers two questions for one host authority:
//! whether a URL may be fetched at all (robots policy) and when the next
//! request may start (adaptive rate gate).

use crate::robots::{agent_token, fetch_robots, RobotsPolicy};
use crate::state::DomainState;
use reqwest::Client;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Settings shared by every controller of one crawl
#[derive(Debug, Clone)]
pub struct AdmissionSettings {
    /// Full User-Agent header; robots groups match its product token
    pub user_agent: String,

    /// Delay used when robots.txt declares no crawl-delay
    pub default_delay: Duration,

    /// Timeout for the robots.txt request
    pub robots_timeout: Duration,
}

/// Outcome of asking a controller for permission to fetch a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may start now
    Granted,
    /// robots.txt forbids the URL
    Denied,
    /// Shutdown was requested while waiting for a slot
    Cancelled,
}

/// Read-only view of a controller for health reporting
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSnapshot {
    pub host: String,
    pub current_delay: Duration,
    pub mean_latency: Option<Duration>,
    pub error_count: u64,
    pub request_count: u64,
    pub error_rate: f64,
}

/// Policy and pacing gate for one host
pub struct AdmissionController {
    host: String,
    agent: String,
    client: Client,
    robots_timeout: Duration,
    policy: OnceCell<RobotsPolicy>,
    state: Mutex<DomainState>,
}

impl AdmissionController {
    /// Creates a controller whose robots policy is fetched on first use
    pub fn new(host: impl Into<String>, client: Client, settings: &AdmissionSettings) -> Self {
        let host = host.into();
        Self {
            state: Mutex::new(DomainState::new(host.clone(), settings.default_delay)),
            agent: agent_token(&settings.user_agent).to_string(),
            host,
            client,
            robots_timeout: settings.robots_timeout,
            policy: OnceCell::new(),
        }
    }

    /// Creates a controller with an already known policy
    ///
    /// The policy's crawl-delay, if any, replaces the default delay.
    pub fn with_policy(
        host: impl Into<String>,
        client: Client,
        settings: &AdmissionSettings,
        policy: RobotsPolicy,
    ) -> Self {
        let controller = Self::new(host, client, settings);
        controller.apply_crawl_delay(&policy);
        let _ = controller.policy.set(policy);
        controller
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Loads the robots policy once; concurrent callers share one fetch
    pub async fn ensure_policy(&self) -> &RobotsPolicy {
        self.policy
            .get_or_init(|| async {
                let policy = fetch_robots(&self.client, &self.host, self.robots_timeout).await;
                self.apply_crawl_delay(&policy);
                debug!(
                    "Loaded robots policy for {} (allow_all: {}, delay: {:?})",
                    self.host,
                    policy.is_allow_all(),
                    self.current_delay()
                );
                policy
            })
            .await
    }

    /// Checks the robots policy for an absolute URL on this host
    pub async fn is_allowed(&self, url: &str) -> bool {
        self.ensure_policy().await.is_allowed(url, &self.agent)
    }

    /// Waits until this host's next request slot
    ///
    /// The slot is reserved under the lock and the sleep happens after the
    /// lock is released. Returns false if `cancel` fires first.
    pub async fn wait_for_slot(&self, cancel: &CancellationToken) -> bool {
        self.ensure_policy().await;

        let wait = self.lock_state().reserve_slot(Instant::now());
        if !wait.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        self.lock_state().record_request_start(Instant::now());
        true
    }

    /// Policy check followed by the rate gate
    pub async fn admit(&self, url: &str, cancel: &CancellationToken) -> Admission {
        if !self.is_allowed(url).await {
            return Admission::Denied;
        }
        if !self.wait_for_slot(cancel).await {
            return Admission::Cancelled;
        }
        Admission::Granted
    }

    /// Feeds a finished attempt into the adaptive delay
    ///
    /// `latency` is `None` when the request produced no response.
    pub fn record_response(&self, latency: Option<Duration>, status: Option<u16>) {
        let mut state = self.lock_state();
        let before = state.current_delay;
        state.record_response(latency, status);
        if state.current_delay != before {
            debug!(
                "Delay for {} adjusted {:?} -> {:?}",
                self.host, before, state.current_delay
            );
        }
    }

    pub fn current_delay(&self) -> Duration {
        self.lock_state().current_delay
    }

    pub fn health(&self) -> HealthSnapshot {
        let state = self.lock_state();
        HealthSnapshot {
            host: self.host.clone(),
            current_delay: state.current_delay,
            mean_latency: state.mean_latency(),
            error_count: state.error_count,
            request_count: state.request_count,
            error_rate: state.error_rate(),
        }
    }

    fn apply_crawl_delay(&self, policy: &RobotsPolicy) {
        if let Some(seconds) = policy.crawl_delay(&self.agent) {
            let delay = Duration::from_secs_f64(seconds.min(3600.0));
            info!("robots.txt for {} requests crawl-delay {:?}", self.host, delay);
            self.lock_state().set_delay(delay);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, DomainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
