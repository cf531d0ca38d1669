//! Process-wide poll timer
//!
//! One timer serves every bound instance. Each tick the scheduler walks the
//! instance store, reports which instances are due for a reload and which
//! have lost their render target. When no live instance remains the timer
//! disarms itself; only a fresh bind arms it again.

use super::instance::{InstanceId, InstanceStore, TargetHandle};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Default tick interval: once per minute
pub const DEFAULT_TICK: Duration = Duration::from_secs(60);

/// Whole minutes between two timestamps, rounded to nearest, always positive
pub fn diff_minutes(now: DateTime<Utc>, then: DateTime<Utc>) -> i64 {
    let seconds = (then - now).num_milliseconds() as f64 / 1000.0;
    (seconds / 60.0).round().abs() as i64
}

/// Result of one scheduler sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sweep {
    /// Live instances whose reload delay has elapsed
    pub due: Vec<InstanceId>,
    /// Instances whose target is gone
    pub detached: Vec<InstanceId>,
}

impl Sweep {
    /// No live instance survived this sweep
    pub fn is_idle(&self, live_before: usize) -> bool {
        self.detached.len() >= live_before
    }
}

#[derive(Debug, Clone)]
pub struct PollScheduler {
    interval: Duration,
    next_tick: Option<Instant>,
}

impl PollScheduler {
    /// Create a disarmed scheduler
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            next_tick: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_armed(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Start ticking if not already running
    pub fn arm(&mut self, now: Instant) {
        if self.next_tick.is_none() {
            tracing::debug!("Poll timer armed ({:?} interval)", self.interval);
            self.next_tick = Some(now + self.interval);
        }
    }

    /// Stop ticking until the next `arm`
    pub fn disarm(&mut self) {
        if self.next_tick.take().is_some() {
            tracing::info!("Poll timer stopped: no live tables");
        }
    }

    /// Time left until the next tick, `None` when disarmed
    pub fn time_until_tick(&self, now: Instant) -> Option<Duration> {
        self.next_tick
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Whether the tick deadline has passed
    pub fn is_tick_due(&self, now: Instant) -> bool {
        self.next_tick.is_some_and(|deadline| now >= deadline)
    }

    /// Schedule the following tick after one fired
    ///
    /// Missed ticks are not replayed: the next deadline is always one
    /// interval from `now`.
    pub fn advance(&mut self, now: Instant) {
        if self.next_tick.is_some() {
            self.next_tick = Some(now + self.interval);
        }
    }

    /// Walk the store and classify instances
    ///
    /// Borrows the store read-only; removing detached instances is left to
    /// the owner.
    pub fn sweep(
        &self,
        instances: &InstanceStore,
        is_attached: impl Fn(&TargetHandle) -> bool,
        now: DateTime<Utc>,
    ) -> Sweep {
        let mut sweep = Sweep::default();

        for instance in instances.iter() {
            if !is_attached(&instance.target) {
                sweep.detached.push(instance.id.clone());
                continue;
            }

            let Some(delay) = instance.reload_delay_minutes else {
                continue;
            };

            if diff_minutes(now, instance.last_update) >= i64::from(delay) {
                sweep.due.push(instance.id.clone());
            }
        }

        sweep
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}
