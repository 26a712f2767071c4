//! Interval growth between polling cycles.
//!
//! The engine asks this policy for the delay before the next cycle after every
//! successful cycle that continues polling. Retries after a failed cycle reuse
//! the current interval and never consult the policy.

use std::time::Duration;

/// Multiplicative backoff with an optional upper bound.
///
/// `factor = 1.0` (the default) keeps the interval constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Multiplier applied to the current interval. Expected to be finite and >= 1;
    /// the engine rejects other values at start.
    pub factor: f64,
    /// Upper bound on the computed interval (None = unbounded).
    pub max_interval: Option<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            factor: 1.0,
            max_interval: None,
        }
    }
}

impl BackoffPolicy {
    pub fn new(factor: f64) -> Self {
        Self {
            factor,
            max_interval: None,
        }
    }

    pub fn with_max_interval(mut self, max: Duration) -> Self {
        self.max_interval = Some(max);
        self
    }

    /// Compute the interval that follows `current`.
    ///
    /// Computed in whole nanoseconds; saturates at `Duration::MAX` instead of
    /// overflowing, then applies the cap.
    pub fn next_interval(&self, current: Duration) -> Duration {
        let grown = if self.factor == 1.0 {
            current
        } else {
            let nanos = (current.as_nanos() as f64 * self.factor).round();
            if nanos.is_finite() && nanos < u64::MAX as f64 {
                Duration::from_nanos(nanos as u64)
            } else {
                Duration::MAX
            }
        };
        match self.max_interval {
            Some(max) => grown.min(max),
            None => grown,
        }
    }

    /// Interval after `n` consecutive continuing cycles starting from `base`.
    pub fn interval_after(&self, base: Duration, n: u32) -> Duration {
        (0..n).fold(base, |d, _| self.next_interval(d))
    }
}
