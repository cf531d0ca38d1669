//! Retry-on-timeout policy for the fetch step

use std::time::Duration;

/// What to do after a failed fetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay` and fetch again
    Retry { attempt: u32, delay: Duration },
    /// Retry budget exhausted; give up on this trigger
    GiveUp { attempts: u32 },
}

/// Counts consecutive timeouts and bounds them by `max_retries`
///
/// Each timeout bumps the counter; another attempt is allowed only while
/// the counter stays below `max_retries`. A success, or the start of a new
/// trigger, resets the counter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
    counter: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay,
            counter: 0,
        }
    }

    /// Record a timeout and decide whether to try again
    pub fn on_timeout(&mut self) -> RetryDecision {
        self.counter = self.counter.saturating_add(1);

        if self.counter < self.max_retries {
            RetryDecision::Retry {
                attempt: self.counter + 1,
                delay: self.delay,
            }
        } else {
            RetryDecision::GiveUp {
                attempts: self.counter,
            }
        }
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }

    /// Consecutive timeouts recorded so far
    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(1))
    }
}
