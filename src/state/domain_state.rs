use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Number of most recent latencies kept per host
pub const LATENCY_WINDOW: usize = 20;

/// Lower bound for the per-host delay
pub const MIN_DELAY: Duration = Duration::from_millis(100);

/// Upper bound for the per-host delay
pub const MAX_DELAY: Duration = Duration::from_secs(60);

/// Multiplier applied when a host looks overloaded
pub const BACKOFF_FACTOR: f64 = 1.8;

/// Multiplier applied when a host answers comfortably fast
pub const RECOVERY_FACTOR: f64 = 0.85;

/// Error rate above which the host is considered overloaded
pub const ERROR_RATE_THRESHOLD: f64 = 0.2;

/// Floor of the synthetic latency charged for attempts with no response
pub const UNKNOWN_LATENCY_FLOOR: Duration = Duration::from_secs(10);

/// Per-host pacing state
///
/// This structure is the mutable half of an admission controller. It is
/// always accessed under the controller's lock, and never awaits, so the
/// lock is only ever held for a few arithmetic operations.
#[derive(Debug, Clone)]
pub struct DomainState {
    /// Host authority this state belongs to
    pub host: String,

    /// Delay enforced between two requests to this host
    pub current_delay: Duration,

    /// Sliding window of recent response latencies
    latency_window: VecDeque<Duration>,

    /// Number of completed request attempts
    pub request_count: u64,

    /// Number of attempts that ended with 5xx, 429 or no response
    pub error_count: u64,

    /// Start time of the most recently reserved request slot
    pub last_request_time: Option<Instant>,
}

impl DomainState {
    /// Creates a new DomainState with the given starting delay
    pub fn new(host: impl Into<String>, initial_delay: Duration) -> Self {
        Self {
            host: host.into(),
            current_delay: clamp_delay(initial_delay),
            latency_window: VecDeque::with_capacity(LATENCY_WINDOW),
            request_count: 0,
            error_count: 0,
            last_request_time: None,
        }
    }

    /// Replaces the delay, e.g. with a robots.txt crawl-delay
    pub fn set_delay(&mut self, delay: Duration) {
        self.current_delay = clamp_delay(delay);
    }

    /// Reserves the next request slot and returns how long to wait for it
    ///
    /// The slot is recorded immediately, so concurrent callers reserving
    /// right after each other are spaced by `current_delay` even though they
    /// sleep outside the lock.
    pub fn reserve_slot(&mut self, now: Instant) -> Duration {
        let slot = match self.last_request_time {
            Some(last) => (last + self.current_delay).max(now),
            None => now,
        };
        self.last_request_time = Some(slot);
        slot.saturating_duration_since(now)
    }

    /// Records the actual request start once the reserved wait is over
    pub fn record_request_start(&mut self, now: Instant) {
        self.last_request_time = Some(match self.last_request_time {
            Some(last) => last.max(now),
            None => now,
        });
    }

    /// Feeds one completed attempt into the adaptive delay
    ///
    /// `latency` is `None` when no response arrived; that attempt counts as
    /// an error and is charged a synthetic latency of
    /// `max(2 × current_delay, 10s)`.
    pub fn record_response(&mut self, latency: Option<Duration>, status: Option<u16>) {
        let is_error = latency.is_none() || matches!(status, Some(s) if s >= 500 || s == 429);
        let latency =
            latency.unwrap_or_else(|| (self.current_delay * 2).max(UNKNOWN_LATENCY_FLOOR));

        if self.latency_window.len() == LATENCY_WINDOW {
            self.latency_window.pop_front();
        }
        self.latency_window.push_back(latency);

        self.request_count += 1;
        if is_error {
            self.error_count += 1;
        }

        let mean = self.mean_latency().unwrap_or(latency);
        let delay = self.current_delay;

        if mean > delay * 2 || self.error_rate() > ERROR_RATE_THRESHOLD {
            let backed_off = scale(delay, BACKOFF_FACTOR).min(MAX_DELAY);
            if backed_off > delay {
                self.current_delay = backed_off;
            }
        } else if mean < scale(delay, 0.6) {
            let recovered = scale(delay, RECOVERY_FACTOR).max(MIN_DELAY);
            if recovered < delay {
                self.current_delay = recovered;
            }
        }

        self.current_delay = clamp_delay(self.current_delay);
    }

    /// Mean of the latency window, `None` before the first response
    pub fn mean_latency(&self) -> Option<Duration> {
        if self.latency_window.is_empty() {
            return None;
        }
        let total: Duration = self.latency_window.iter().sum();
        Some(total / self.latency_window.len() as u32)
    }

    /// Errors divided by requests since this state was created
    pub fn error_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.request_count as f64
        }
    }
}

fn clamp_delay(delay: Duration) -> Duration {
    delay.clamp(MIN_DELAY, MAX_DELAY)
}

fn scale(delay: Duration, factor: f64) -> Duration {
    Duration::from_nanos((delay.as_nanos() as f64 * factor).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_new_domain_state() {
        let state = DomainState::new("example.com", Duration::from_secs(1));
        assert_eq!(state.host, "example.com");
        assert_eq!(state.current_delay, Duration::from_secs(1));
        assert_eq!(state.request_count, 0);
        assert!(state.last_request_time.is_none());
        assert!(state.mean_latency().is_none());
        assert_eq!(state.error_rate(), 0.0);
    }

    #[test]
    fn test_initial_delay_is_clamped() {
        assert_eq!(DomainState::new("a", ms(0)).current_delay, MIN_DELAY);
        assert_eq!(
            DomainState::new("a", Duration::from_secs(3600)).current_delay,
            MAX_DELAY
        );
    }

    #[test]
    fn test_first_slot_is_immediate() {
        let mut state = DomainState::new("a", ms(500));
        let now = Instant::now();
        assert_eq!(state.reserve_slot(now), Duration::ZERO);
        assert_eq!(state.last_request_time, Some(now));
    }

    #[test]
    fn test_consecutive_slots_are_spaced_by_delay() {
        let mut state = DomainState::new("a", ms(500));
        let now = Instant::now();

        assert_eq!(state.reserve_slot(now), Duration::ZERO);
        assert_eq!(state.reserve_slot(now), ms(500));
        // A third caller queues behind the second reservation
        assert_eq!(state.reserve_slot(now), ms(1000));
    }

    #[test]
    fn test_slot_after_delay_elapsed_is_immediate() {
        let mut state = DomainState::new("a", ms(500));
        let now = Instant::now();
        state.reserve_slot(now);

        let later = now + ms(800);
        assert_eq!(state.reserve_slot(later), Duration::ZERO);
        assert_eq!(state.last_request_time, Some(later));
    }

    #[test]
    fn test_record_request_start_never_moves_backwards() {
        let mut state = DomainState::new("a", ms(500));
        let now = Instant::now();
        state.reserve_slot(now);
        state.reserve_slot(now);

        state.record_request_start(now);
        assert_eq!(state.last_request_time, Some(now + ms(500)));
    }

    #[test]
    fn test_slow_responses_back_off() {
        let mut state = DomainState::new("a", ms(1000));
        state.record_response(Some(ms(2500)), Some(200));
        assert_eq!(state.current_delay, ms(1800));
    }

    #[test]
    fn test_fast_responses_recover() {
        let mut state = DomainState::new("a", ms(1000));
        state.record_response(Some(ms(100)), Some(200));
        assert_eq!(state.current_delay, ms(850));
    }

    #[test]
    fn test_moderate_responses_keep_delay() {
        let mut state = DomainState::new("a", ms(1000));
        state.record_response(Some(ms(900)), Some(200));
        assert_eq!(state.current_delay, ms(1000));
    }

    #[test]
    fn test_server_errors_and_429_count() {
        let mut state = DomainState::new("a", ms(1000));
        state.record_response(Some(ms(100)), Some(503));
        state.record_response(Some(ms(100)), Some(429));
        state.record_response(Some(ms(100)), Some(404));
        assert_eq!(state.request_count, 3);
        assert_eq!(state.error_count, 2);
    }

    #[test]
    fn test_error_rate_triggers_backoff_despite_fast_latency() {
        let mut state = DomainState::new("a", ms(1000));
        state.record_response(Some(ms(50)), Some(500));
        assert_eq!(state.current_delay, ms(1800));
    }

    #[test]
    fn test_missing_latency_is_penalized() {
        let mut state = DomainState::new("a", ms(1000));
        state.record_response(None, None);

        assert_eq!(state.error_count, 1);
        assert_eq!(state.mean_latency(), Some(UNKNOWN_LATENCY_FLOOR));
        assert_eq!(state.current_delay, ms(1800));
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let mut state = DomainState::new("a", ms(1000));
        for _ in 0..LATENCY_WINDOW {
            state.record_response(Some(ms(5000)), Some(200));
        }
        for _ in 0..LATENCY_WINDOW {
            state.record_response(Some(ms(10)), Some(200));
        }
        // Only the fast responses remain in the window
        assert_eq!(state.mean_latency(), Some(ms(10)));
        assert_eq!(state.request_count, 2 * LATENCY_WINDOW as u64);
    }

    #[test]
    fn test_sustained_slow_responses_never_decrease_delay() {
        let mut state = DomainState::new("a", ms(1000));
        let mut previous = state.current_delay;
        for _ in 0..50 {
            state.record_response(Some(Duration::from_secs(200)), Some(200));
            assert!(state.current_delay >= previous);
            previous = state.current_delay;
        }
        assert_eq!(state.current_delay, MAX_DELAY);
    }

    #[test]
    fn test_sustained_errors_never_decrease_delay() {
        let mut state = DomainState::new("a", ms(200));
        let mut previous = state.current_delay;
        for _ in 0..50 {
            state.record_response(Some(ms(10)), Some(502));
            assert!(state.current_delay >= previous);
            previous = state.current_delay;
        }
    }

    #[test]
    fn test_sustained_fast_responses_never_increase_delay() {
        let mut state = DomainState::new("a", Duration::from_secs(5));
        let mut previous = state.current_delay;
        for _ in 0..100 {
            state.record_response(Some(ms(20)), Some(200));
            assert!(state.current_delay <= previous);
            previous = state.current_delay;
        }
        assert_eq!(state.current_delay, MIN_DELAY);
    }
}
