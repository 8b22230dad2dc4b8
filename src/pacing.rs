//! Time source and request pacing.
//!
//! Every wait in the pipeline goes through a [`Clock`]: crawler courtesy
//! delays, geocoder backoff and the batch driver's rate limit.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Strict minimum spacing between consecutive requests.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Wait until a request may be sent, then stamp it as sent.
    pub async fn acquire(&mut self, clock: &dyn Clock) {
        if let Some(last) = self.last_request {
            let elapsed = clock.now().saturating_duration_since(last);
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!("Rate limit: waiting {:?}", wait);
                clock.sleep(wait).await;
            }
        }
        self.last_request = Some(clock.now());
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ManualClock;
    use super::*;

    #[tokio::test]
    async fn test_first_request_is_not_delayed() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(Duration::from_secs(1));

        limiter.acquire(&clock).await;
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_sleeps_only_the_remainder() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(Duration::from_secs(1));

        limiter.acquire(&clock).await;
        clock.advance(Duration::from_millis(300));
        limiter.acquire(&clock).await;
        clock.advance(Duration::from_secs(2));
        limiter.acquire(&clock).await;

        assert_eq!(clock.sleeps(), vec![Duration::from_millis(700)]);
    }
}
