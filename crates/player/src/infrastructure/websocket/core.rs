//! Runtime-free reconnection backoff math for the session client.

use std::time::Duration;

use super::shared::{INITIAL_RETRY_DELAY_MS, MAX_RETRY_ATTEMPTS};

/// Reconnection tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt
    pub base_delay: Duration,
    /// Reconnect attempts allowed before giving up
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(INITIAL_RETRY_DELAY_MS),
            max_attempts: MAX_RETRY_ATTEMPTS,
        }
    }
}

/// Whole milliseconds in `delay`, clamped to `u64::MAX`.
pub fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// Exponential backoff state shared by reconnect logic.
///
/// The delay before attempt `n` (1-based) is `base_delay * 2^(n-1)`, uncapped.
#[derive(Debug, Clone, Copy)]
pub struct BackoffState {
    policy: ReconnectPolicy,
    attempts: u32,
    delay: Duration,
}

impl BackoffState {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            delay: policy.base_delay,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.policy);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay of the most recently scheduled attempt, or the base delay if none.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.policy.max_attempts
    }

    /// Advance to the next attempt.
    ///
    /// Returns the delay to wait *before* performing this attempt, or `None`
    /// once the attempt budget is spent.
    pub fn next_delay_and_advance(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        self.attempts += 1;
        let factor = 1u32.checked_shl(self.attempts - 1).unwrap_or(u32::MAX);
        self.delay = self.policy.base_delay.saturating_mul(factor);
        Some(self.delay)
    }
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}
