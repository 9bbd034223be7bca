//! Bounded retry with rate-limit awareness for HTTP requests.
//!
//! [`RetryRateLimitInterceptor`] sits between the RPC handle and the network.
//! Each request gets its own retry budget; nothing is shared between requests.
//!
//! # Delay selection
//!
//! - A server-supplied `Retry-After` wins when present.
//! - Otherwise the delay grows exponentially from
//!   [`RetryConfig::initial_backoff`] with a small random jitter.
//! - Either way the delay never exceeds [`RetryConfig::max_backoff`].

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::error::{BoxError, ProviderError, ProviderResult};

/// Configuration for the HTTP retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay, including `Retry-After`.
    pub max_backoff: Duration,
    /// Growth factor applied per retry.
    pub multiplier: f64,
    /// Jitter as a fraction of the computed delay (0.0 disables it).
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_fraction: 0.1,
        }
    }
}

/// Stateless retry policy computing the delay before each retry.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a policy from its configuration.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Configuration this policy was built from.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay before retrying after the `failures`-th failed attempt.
    ///
    /// Returns `None` once the retry budget is spent.
    #[must_use]
    pub fn next_delay(&self, failures: u32, retry_after: Option<Duration>) -> Option<Duration> {
        if failures == 0 || failures > self.config.max_retries {
            return None;
        }

        let delay = retry_after.unwrap_or_else(|| self.backoff(failures));
        Some(delay.min(self.config.max_backoff))
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn backoff(&self, failures: u32) -> Duration {
        let exponent = i32::try_from(failures - 1).unwrap_or(i32::MAX);
        let base_ms =
            self.config.initial_backoff.as_millis() as f64 * self.config.multiplier.powi(exponent);
        let capped_ms = base_ms.min(self.config.max_backoff.as_millis() as f64);

        let jitter = if self.config.jitter_fraction > 0.0 {
            self.config.jitter_fraction * rand::random::<f64>().mul_add(2.0, -1.0)
        } else {
            0.0
        };

        Duration::from_millis((capped_ms * (1.0 + jitter)).max(0.0) as u64)
    }
}

/// Outcome of a single failed attempt, as seen by the interceptor.
#[derive(Debug)]
pub enum AttemptError {
    /// Worth retrying: network hiccup or rate limit.
    Transient {
        /// Description of the failure
        reason: String,
        /// Server-supplied delay, if any
        retry_after: Option<Duration>,
        /// Optional underlying error
        source: Option<BoxError>,
    },
    /// Surfaced immediately.
    Fatal(ProviderError),
}

impl AttemptError {
    /// Create a transient attempt failure.
    #[must_use]
    pub fn transient(
        reason: impl Into<String>,
        retry_after: Option<Duration>,
        source: Option<BoxError>,
    ) -> Self {
        Self::Transient {
            reason: reason.into(),
            retry_after,
            source,
        }
    }
}

impl From<ProviderError> for AttemptError {
    fn from(err: ProviderError) -> Self {
        Self::Fatal(err)
    }
}

/// Request interceptor retrying transient failures with bounded backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryRateLimitInterceptor {
    policy: RetryPolicy,
}

impl RetryRateLimitInterceptor {
    /// Create an interceptor with the given retry configuration.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self {
            policy: RetryPolicy::new(config),
        }
    }

    /// Policy used to space out retries.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `send` until it succeeds, fails fatally, or the budget is spent.
    ///
    /// `send` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// - The fatal error of any attempt, unchanged.
    /// - [`ProviderError::TransientRequest`] when every attempt failed
    ///   transiently.
    pub async fn execute<T, F, Fut>(&self, mut send: F) -> ProviderResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match send(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(AttemptError::Fatal(err)) => return Err(err),
                Err(AttemptError::Transient {
                    reason,
                    retry_after,
                    source,
                }) => match self.policy.next_delay(attempt, retry_after) {
                    Some(delay) => {
                        warn!(
                            attempt,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            server_delay = retry_after.is_some(),
                            reason = %reason,
                            "transient request failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!(attempt, reason = %reason, "retry budget exhausted");
                        return Err(ProviderError::transient_request(attempt, reason, source));
                    }
                },
            }
        }
    }
}

impl Default for RetryRateLimitInterceptor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Status codes signaling the node wants the caller to slow down.
#[must_use]
pub const fn is_rate_limit_status(status: u16) -> bool {
    matches!(status, 429 | 503)
}

/// Status codes worth retrying: rate limits plus gateway failures.
#[must_use]
pub const fn is_transient_status(status: u16) -> bool {
    is_rate_limit_status(status) || matches!(status, 502 | 504)
}

/// Parse a `Retry-After` header value.
///
/// Accepts delta-seconds (`"120"`) or an HTTP-date
/// (`"Wed, 21 Oct 2015 07:28:00 GMT"`). Dates in the past yield zero.
#[must_use]
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        (at.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}
