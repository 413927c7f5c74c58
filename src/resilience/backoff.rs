//! Exponential backoff with jitter between failed passes.

use rand::Rng;
use std::time::{Duration, Instant};

/// Calculate exponential backoff delay with jitter.
///
/// `attempt` counts consecutive failures; zero means no delay.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let capped_delay = base_ms.saturating_mul(exponential_base).min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Failure streak of one listener and the earliest time it may run again.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    failures: u32,
    not_before: Option<Instant>,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            failures: 0,
            not_before: None,
        }
    }

    /// Whether a pass may start at `now`.
    pub fn is_ready(&self, now: Instant) -> bool {
        self.not_before.map_or(true, |t| now >= t)
    }

    /// Register a failed pass; returns the delay before the next attempt.
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = calculate_backoff(self.failures, self.base_ms, self.max_ms);
        self.not_before = Some(now + delay);
        delay
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        self.not_before = None;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
