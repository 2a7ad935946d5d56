//! Backoff policy for rate-limited and failed requests
//!
//! [`BackoffController::decide`] is a pure function of the failure class and the
//! attempt number, apart from the jitter draw. The delay follows
//! `base * 2^attempt + uniform(0, max_jitter)`, capped at `max_delay` before the
//! jitter is added, and retrying stops once the attempt number reaches the
//! ceiling configured for the class.
//!
//! # Example
//!
//! ```
//! use timeline_dl::config::RetryConfig;
//! use timeline_dl::retry::{BackoffController, FailureClass, FixedJitter};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let backoff = BackoffController::new(RetryConfig::default(), Arc::new(FixedJitter::ZERO));
//!
//! let first = backoff.decide(FailureClass::RateLimited, 0);
//! assert!(first.should_retry);
//! assert_eq!(first.delay, Duration::from_millis(2000));
//!
//! let last = backoff.decide(FailureClass::RateLimited, 5);
//! assert!(!last.should_retry);
//! ```

use crate::config::RetryConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Failure classes the backoff policy distinguishes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// The server answered HTTP 429
    RateLimited,
    /// Connection failure, timeout or unreadable body
    NetworkError,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureClass::RateLimited => f.write_str("rate limited"),
            FailureClass::NetworkError => f.write_str("network error"),
        }
    }
}

/// Outcome of one backoff decision; produced fresh for every failed attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether the request should be issued again
    pub should_retry: bool,
    /// How long to wait before retrying
    pub delay: Duration,
}

impl RetryDecision {
    /// Delay in whole milliseconds
    pub fn delay_millis(&self) -> u64 {
        u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Source of uniform random jitter
///
/// Production code uses [`ThreadRngJitter`]; tests inject [`FixedJitter`].
pub trait JitterSource: Send + Sync {
    /// A duration drawn from `[0, max]`
    fn jitter(&self, max: Duration) -> Duration;
}

/// Jitter drawn from the thread-local RNG (never deterministically seeded)
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn jitter(&self, max: Duration) -> Duration {
        let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(0..=max_ms))
    }
}

/// Constant jitter, clamped to the requested maximum
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub Duration);

impl FixedJitter {
    /// No jitter at all
    pub const ZERO: FixedJitter = FixedJitter(Duration::ZERO);
}

impl JitterSource for FixedJitter {
    fn jitter(&self, max: Duration) -> Duration {
        self.0.min(max)
    }
}

/// Exponential part of the delay for `attempt`, before jitter
///
/// Non-decreasing in `attempt`; saturates at `config.max_delay`.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    config
        .base_delay
        .checked_mul(factor)
        .map_or(config.max_delay, |d| d.min(config.max_delay))
}

/// Backoff policy shared by every request the harvester issues
#[derive(Clone)]
pub struct BackoffController {
    config: RetryConfig,
    jitter: Arc<dyn JitterSource>,
}

impl BackoffController {
    /// Create a controller with the given policy and jitter source
    pub fn new(config: RetryConfig, jitter: Arc<dyn JitterSource>) -> Self {
        Self { config, jitter }
    }

    /// Retry ceiling for `class`
    pub fn ceiling(&self, class: FailureClass) -> u32 {
        match class {
            FailureClass::RateLimited => self.config.max_rate_limit_retries,
            FailureClass::NetworkError => self.config.max_network_retries,
        }
    }

    /// Decide whether attempt number `attempt` (0-based) of a failed request is retried
    pub fn decide(&self, class: FailureClass, attempt: u32) -> RetryDecision {
        if attempt >= self.ceiling(class) {
            return RetryDecision {
                should_retry: false,
                delay: Duration::ZERO,
            };
        }

        let delay = backoff_delay(&self.config, attempt)
            .saturating_add(self.jitter.jitter(self.config.max_jitter));

        RetryDecision {
            should_retry: true,
            delay,
        }
    }
}

impl std::fmt::Debug for BackoffController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackoffController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
