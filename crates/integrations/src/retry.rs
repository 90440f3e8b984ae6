//! Bounded exponential backoff for idempotent outbound calls.
//!
//! Probes, feed polls and notifier posts go through
//! [`HttpClient::send_with_retry`](crate::http::HttpClient::send_with_retry),
//! which re-sends a request after a transient failure (network error,
//! timeout, `429` or `5xx`) with increasing delays. Flow triggers are never
//! retried: a duplicate run is worse than a reported failure.

use std::time::Duration;

use crate::http::{HttpError, HttpResponse};

/// Tunable parameters for the backoff strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. `1` disables retries.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that sends every request exactly once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Calculate the next backoff delay from the current delay and policy.
///
/// The result is clamped to [`RetryPolicy::max_delay`].
pub fn next_delay(current: Duration, policy: &RetryPolicy) -> Duration {
    let next_ms = (current.as_millis() as f64 * policy.multiplier) as u64;
    Duration::from_millis(next_ms).min(policy.max_delay)
}

/// Whether an attempt's outcome is worth another try.
///
/// Client errors other than `429` and undecodable bodies are final.
pub fn is_transient(result: &Result<HttpResponse, HttpError>) -> bool {
    match result {
        Ok(response) => response.status == 429 || response.status >= 500,
        Err(HttpError::Request(_) | HttpError::Timeout(_)) => true,
        Err(HttpError::Decode(_)) => false,
    }
}
