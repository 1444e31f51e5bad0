//! Request spacing.
//!
//! The street-level crime API asks clients to space their requests. A
//! [`RateLimiter`] holds the timestamp of the last request and, before each
//! new one, sleeps until the configured minimum interval has passed. Time
//! is read through a [`Clock`] so tests can run against a [`VirtualClock`]
//! that advances instantly.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Source of time for rate limiting and retry delays.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Waits for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by tokio's timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A clock that only moves when slept on or advanced explicitly.
#[derive(Debug)]
pub struct VirtualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl VirtualClock {
    /// Creates a clock starting at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    /// Total virtual time that has passed.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the clock forward without sleeping.
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner) += duration;
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Enforces a minimum interval between consecutive requests.
///
/// Every call to [`RateLimiter::acquire`] consumes one slot, whatever the
/// outcome of the request that follows.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    min_interval: Duration,
    last_call: tokio::sync::Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter spacing calls at least `min_interval` apart.
    #[must_use]
    pub fn new(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            min_interval,
            last_call: tokio::sync::Mutex::new(None),
        }
    }

    /// The configured minimum interval.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until a request may be issued, then records it as issued.
    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;

        if let Some(previous) = *last_call {
            let since = self.clock.now().saturating_duration_since(previous);
            if since < self.min_interval {
                let wait = self.min_interval - since;
                log::trace!("rate limiter: waiting {wait:?}");
                self.clock.sleep(wait).await;
            }
        }

        *last_call = Some(self.clock.now());
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("min_interval", &self.min_interval)
            .finish_non_exhaustive()
    }
}
