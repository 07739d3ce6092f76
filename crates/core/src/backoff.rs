// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnect backoff.
//!
//! Delays grow by a fixed multiplier from a floor up to a ceiling:
//! with the defaults the first scheduled reconnects wait 1000, 1500 and
//! 2250 ms. After `max_attempts` scheduled reconnects the policy gives up.

use std::time::Duration;

/// Floor delay for the first scheduled reconnect.
pub const DEFAULT_FLOOR: Duration = Duration::from_millis(1000);
/// Upper bound for any scheduled delay.
pub const DEFAULT_CEILING: Duration = Duration::from_millis(30_000);
pub const DEFAULT_MULTIPLIER: f64 = 1.5;
/// Scheduled reconnects allowed before giving up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Immutable backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub floor: Duration,
    pub ceiling: Duration,
    pub multiplier: f64,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            floor: DEFAULT_FLOOR,
            ceiling: DEFAULT_CEILING,
            multiplier: DEFAULT_MULTIPLIER,
            max_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl BackoffPolicy {
    /// Delay that follows `current`, capped at the ceiling.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let scaled = current.as_secs_f64() * self.multiplier;
        if !scaled.is_finite() || scaled >= self.ceiling.as_secs_f64() {
            return self.ceiling;
        }
        Duration::from_secs_f64(scaled).max(self.floor.min(self.ceiling))
    }
}

/// Mutable backoff progress for one session.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    retry_delay: Duration,
    attempt_count: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Backoff {
            retry_delay: policy.floor.min(policy.ceiling),
            attempt_count: 0,
            policy,
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Delay the next scheduled reconnect would wait.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Returns true once the attempt budget has been used up.
    pub fn is_exhausted(&self) -> bool {
        self.attempt_count > self.policy.max_attempts
    }

    /// Records a scheduled reconnect and returns how long to wait for it.
    ///
    /// Returns `None` when the attempt count exceeds the policy maximum;
    /// the caller must stop retrying.
    pub fn schedule(&mut self) -> Option<Duration> {
        self.attempt_count = self.attempt_count.saturating_add(1);
        if self.is_exhausted() {
            return None;
        }
        let delay = self.retry_delay;
        self.retry_delay = self.policy.next_delay(self.retry_delay);
        Some(delay)
    }

    /// Back to the floor with no attempts recorded.
    pub fn reset(&mut self) {
        self.retry_delay = self.policy.floor.min(self.policy.ceiling);
        self.attempt_count = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
