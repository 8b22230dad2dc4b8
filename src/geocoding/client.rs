//! Geocoding client with bounded exponential backoff on HTTP 429.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::response::extract_best_match;
use super::transport::GeocodeTransport;
use crate::config::GeocodingConfig;
use crate::error::GeocodeError;
use crate::models::GeocodeResult;
use crate::pacing::Clock;

type JitterFn = dyn Fn() -> Duration + Send + Sync;

/// Backoff parameters for rate-limited requests
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&GeocodingConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &GeocodingConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            jitter_min: Duration::from_millis(config.jitter_min_ms),
            jitter_max: Duration::from_millis(config.jitter_max_ms),
        }
    }
}

/// Retry state for a single address.
///
/// `Idle → Sent → {Success, RateLimited, HardFailure}`; a rate-limited send
/// either backs off and returns to `Sent` or, once the budget is spent,
/// ends in `RateLimitExceeded`.
#[derive(Debug)]
struct Backoff {
    attempts: u32,
    max_retries: u32,
    delay: Duration,
}

impl Backoff {
    fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempts: 0,
            max_retries: policy.max_retries,
            delay: policy.initial_delay,
        }
    }

    /// Register a 429. Returns the wait before the next send, or `None`
    /// when no retry is left.
    fn on_rate_limited(&mut self, jitter: Duration) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts > self.max_retries {
            return None;
        }
        let wait = self.delay + jitter;
        self.delay *= 2;
        Some(wait)
    }
}

enum Outcome {
    Success(String),
    RateLimited,
    HardFailure(GeocodeError),
}

/// Resolves free-text addresses to coordinates.
///
/// Stateless across calls; the backoff counters live only for the duration
/// of one `geocode` call.
pub struct GeocodingClient {
    transport: Box<dyn GeocodeTransport>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    jitter: Box<JitterFn>,
}

impl GeocodingClient {
    pub fn new(
        transport: Box<dyn GeocodeTransport>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        let (low, high) = (policy.jitter_min, policy.jitter_max);
        Self {
            transport,
            clock,
            policy,
            jitter: Box::new(move || random_jitter(low, high)),
        }
    }

    /// Replace the random jitter source.
    pub fn with_jitter(mut self, jitter: impl Fn() -> Duration + Send + Sync + 'static) -> Self {
        self.jitter = Box::new(jitter);
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Resolve one address to its best match.
    pub async fn geocode(&self, address: &str) -> Result<GeocodeResult, GeocodeError> {
        let mut backoff = Backoff::new(&self.policy);

        loop {
            match self.send_once(address).await {
                Outcome::Success(body) => {
                    let result = extract_best_match(&body);
                    match &result {
                        Ok(found) => debug!(
                            "Geocoded '{}' -> {:?}, {:?}",
                            address, found.latitude, found.longitude
                        ),
                        Err(e) => warn!("No usable result for '{}': {}", address, e),
                    }
                    return result;
                }
                Outcome::RateLimited => {
                    let jitter = (self.jitter)();
                    match backoff.on_rate_limited(jitter) {
                        Some(wait) => {
                            warn!(
                                "Rate limited. Waiting {:.2}s before retry {}/{}",
                                wait.as_secs_f64(),
                                backoff.attempts,
                                self.policy.max_retries
                            );
                            self.clock.sleep(wait).await;
                        }
                        None => {
                            warn!(
                                "Giving up on '{}' after {} rate-limited attempts",
                                address, backoff.attempts
                            );
                            return Err(GeocodeError::RateLimitExceeded {
                                attempts: backoff.attempts,
                            });
                        }
                    }
                }
                Outcome::HardFailure(e) => {
                    warn!("Error geocoding address '{}': {}", address, e);
                    return Err(e);
                }
            }
        }
    }

    async fn send_once(&self, address: &str) -> Outcome {
        match self.transport.send(address).await {
            Ok(response) if response.is_rate_limited() => Outcome::RateLimited,
            Ok(response) if response.is_success() => Outcome::Success(response.body),
            Ok(response) => Outcome::HardFailure(GeocodeError::RequestFailed(format!(
                "status {}",
                response.status
            ))),
            Err(e) => Outcome::HardFailure(e),
        }
    }
}

fn random_jitter(low: Duration, high: Duration) -> Duration {
    if high <= low {
        return low;
    }
    let secs = rand::thread_rng().gen_range(low.as_secs_f64()..high.as_secs_f64());
    Duration::from_secs_f64(secs)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::geocoding::transport::TransportResponse;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted responses and records every address sent.
    #[derive(Default)]
    pub struct ScriptedTransport {
        script: Mutex<VecDeque<Result<TransportResponse, GeocodeError>>>,
        fallback: Option<(u16, String)>,
        pub sent: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer every address not covered by the script with this response.
        pub fn always(status: u16, body: &str) -> Self {
            Self {
                fallback: Some((status, body.to_string())),
                ..Self::default()
            }
        }

        pub fn respond(self, status: u16, body: &str) -> Self {
            self.script.lock().unwrap().push_back(Ok(TransportResponse {
                status,
                body: body.to_string(),
            }));
            self
        }

        pub fn fail(self, message: &str) -> Self {
            self.script
                .lock()
                .unwrap()
                .push_back(Err(GeocodeError::RequestFailed(message.to_string())));
            self
        }
    }

    #[async_trait]
    impl GeocodeTransport for ScriptedTransport {
        async fn send(&self, address: &str) -> Result<TransportResponse, GeocodeError> {
            self.sent.lock().unwrap().push(address.to_string());
            if let Some(next) = self.script.lock().unwrap().pop_front() {
                return next;
            }
            match &self.fallback {
                Some((status, body)) => Ok(TransportResponse {
                    status: *status,
                    body: body.clone(),
                }),
                None => Err(GeocodeError::RequestFailed("script exhausted".to_string())),
            }
        }
    }

    pub const MATCH: &str =
        r#"{"result": {"items": [{"point": {"lat": 43.238949, "lon": 76.889709}, "full_name": "Almaty"}]}}"#;
}

#[cfg(test)]
mod tests {
    use super::testing::{ScriptedTransport, MATCH};
    use super::*;
    use crate::pacing::testing::ManualClock;

    fn client(transport: ScriptedTransport, clock: Arc<ManualClock>) -> GeocodingClient {
        GeocodingClient::new(Box::new(transport), clock, RetryPolicy::default())
            .with_jitter(|| Duration::from_millis(1500))
    }

    #[tokio::test]
    async fn test_two_rate_limits_then_success() {
        let clock = Arc::new(ManualClock::new());
        let transport = ScriptedTransport::new()
            .respond(429, "")
            .respond(429, "")
            .respond(200, MATCH);
        let sent = transport.sent.clone();

        let result = client(transport, clock.clone()).geocode("Almaty").await.unwrap();

        assert_eq!(result.latitude, Some(43.238949));
        assert_eq!(sent.lock().unwrap().len(), 3);

        let sleeps = clock.sleeps();
        assert_eq!(sleeps.len(), 2);
        assert!(sleeps[1] > sleeps[0]);
        assert_eq!(sleeps[0], Duration::from_millis(2500));
        assert_eq!(sleeps[1], Duration::from_millis(3500));
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let clock = Arc::new(ManualClock::new());
        let transport = ScriptedTransport::always(429, "");
        let sent = transport.sent.clone();

        let err = client(transport, clock.clone()).geocode("Almaty").await.unwrap_err();

        assert!(matches!(err, GeocodeError::RateLimitExceeded { attempts: 4 }));
        assert_eq!(sent.lock().unwrap().len(), 4);
        assert_eq!(clock.sleeps().len(), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let clock = Arc::new(ManualClock::new());
        let transport = ScriptedTransport::new().respond(500, "oops").respond(200, MATCH);
        let sent = transport.sent.clone();

        let err = client(transport, clock.clone()).geocode("Almaty").await.unwrap_err();

        assert!(matches!(err, GeocodeError::RequestFailed(_)));
        assert_eq!(sent.lock().unwrap().len(), 1);
        assert!(clock.sleeps().is_empty());

        let clock = Arc::new(ManualClock::new());
        let transport = ScriptedTransport::new().fail("connection reset");
        let err = client(transport, clock).geocode("Almaty").await.unwrap_err();
        assert!(matches!(err, GeocodeError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn test_empty_result_is_no_match() {
        let clock = Arc::new(ManualClock::new());
        let transport = ScriptedTransport::new().respond(200, r#"{"result": {"items": []}}"#);

        let err = client(transport, clock).geocode("Nowhere").await.unwrap_err();
        assert!(matches!(err, GeocodeError::NoMatch));
    }

    #[test]
    fn test_random_jitter_range() {
        let low = Duration::from_secs(1);
        let high = Duration::from_secs(3);
        for _ in 0..100 {
            let jitter = random_jitter(low, high);
            assert!(jitter >= low && jitter < high);
        }
        assert_eq!(random_jitter(high, low), high);
    }
}
