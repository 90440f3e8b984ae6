//! Outbound HTTP plumbing shared by every integration.
//!
//! [`HttpClient`] is the only way integrations reach the network. It sends
//! an [`HttpRequest`] through an [`HttpTransport`] (reqwest in production, a
//! scripted fake in tests) and always hands back a value: transport
//! failures, deadlines and undecodable bodies come back as [`HttpError`],
//! never as a panic.
//!
//! When a request carries an explicit timeout the in-flight transport
//! future is dropped once the deadline passes, which cancels the call.
//! [`HttpClient::send_with_retry`] applies that deadline to the whole
//! retry sequence, backoff sleeps included.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use krizzy_core::{FailureKind, OpsFailure};
use reqwest::{Method, Url};
use serde_json::Value;

use crate::retry::{self, RetryPolicy};

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// A single outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// JSON body, sent with `Content-Type: application/json`.
    pub body: Option<Value>,
    /// Hard deadline for the whole call. `None` uses the transport default.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        let mut request = Self::new(Method::POST, url);
        request.body = Some(body);
        request
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_str(&self.body).map_err(|e| HttpError::Decode(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Failure of an outbound exchange.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HttpError {
    /// The request could not be completed (network, DNS, TLS, bad URL).
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The deadline elapsed and the call was cancelled.
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The response body was not what the caller expected.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl HttpError {
    pub fn kind(&self) -> FailureKind {
        match self {
            HttpError::Request(_) => FailureKind::Transport,
            HttpError::Timeout(_) => FailureKind::Timeout,
            HttpError::Decode(_) => FailureKind::Parse,
        }
    }
}

impl From<HttpError> for OpsFailure {
    fn from(err: HttpError) -> Self {
        OpsFailure::new(err.kind(), err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// Executes one request against the network (or a stand-in for it).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Production transport backed by a pooled [`reqwest::Client`].
pub struct ReqwestTransport {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl ReqwestTransport {
    /// Build a transport whose requests default to `default_timeout`.
    pub fn new(default_timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(default_timeout)
            .user_agent(concat!("krizzy-ops/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Request(e.to_string()))?;
        Ok(Self {
            client,
            default_timeout,
        })
    }

    fn classify(&self, err: reqwest::Error, timeout: Option<Duration>) -> HttpError {
        if err.is_timeout() {
            HttpError::Timeout(timeout.unwrap_or(self.default_timeout))
        } else {
            HttpError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.classify(e, request.timeout))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.classify(e, request.timeout))?;

        Ok(HttpResponse { status, body })
    }
}

// ---------------------------------------------------------------------------
// HttpClient
// ---------------------------------------------------------------------------

/// Cheaply cloneable handle used by every probe, trigger and the notifier.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn HttpTransport>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

impl HttpClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the backoff policy used by [`send_with_retry`](Self::send_with_retry).
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Client over a [`ReqwestTransport`].
    pub fn reqwest(default_timeout: Duration) -> Result<Self, HttpError> {
        Ok(Self::new(Arc::new(ReqwestTransport::new(default_timeout)?)))
    }

    /// Send a request, enforcing its timeout by cancelling the transport call.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let method = request.method.clone();
        let target = log_target(&request.url);

        let result = match request.timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.execute(request))
                .await
                .unwrap_or(Err(HttpError::Timeout(limit))),
            None => self.transport.execute(request).await,
        };

        match &result {
            Ok(response) => {
                tracing::debug!(%method, target = %target, status = response.status, "Outbound request completed");
            }
            Err(e) => {
                tracing::debug!(%method, target = %target, error = %e, "Outbound request failed");
            }
        }
        result
    }
}

impl HttpClient {
    /// Send an idempotent request, re-sending it after transient failures.
    ///
    /// The request's timeout bounds every attempt and the backoff between
    /// them; when it elapses the sequence is cancelled with
    /// [`HttpError::Timeout`]. The last attempt's outcome is returned.
    pub async fn send_with_retry(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        match request.timeout {
            Some(limit) => tokio::time::timeout(limit, self.attempts(request))
                .await
                .unwrap_or(Err(HttpError::Timeout(limit))),
            None => self.attempts(request).await,
        }
    }

    async fn attempts(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 1u32;

        loop {
            let result = self.send(request.clone()).await;
            if attempt >= self.retry.max_attempts || !retry::is_transient(&result) {
                return result;
            }

            match &result {
                Ok(response) => tracing::warn!(
                    target = %log_target(&request.url),
                    attempt,
                    status = response.status,
                    delay_ms = delay.as_millis() as u64,
                    "Transient response, retrying"
                ),
                Err(e) => tracing::warn!(
                    target = %log_target(&request.url),
                    attempt,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Request failed, retrying"
                ),
            }

            tokio::time::sleep(delay).await;
            delay = retry::next_delay(delay, &self.retry);
            attempt += 1;
        }
    }
}

/// Host part of a URL for logging. Webhook paths and query strings carry
/// credentials and are never logged.
fn log_target(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "<invalid url>".to_string())
}

/// Append path segments to `base`, percent-encoding each one.
///
/// Returns an `invalid_config` failure naming `key` when `base` is not an
/// absolute URL.
pub(crate) fn join_url(key: &str, base: &str, segments: &[&str]) -> Result<Url, OpsFailure> {
    let invalid = || {
        OpsFailure::new(
            FailureKind::InvalidConfig,
            format!("{key} is not a valid base URL: {base}"),
        )
    };
    let mut url = Url::parse(base).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransport, Reply};
    use assert_matches::assert_matches;

    #[test]
    fn success_range() {
        assert!(HttpResponse { status: 204, body: String::new() }.is_success());
        assert!(!HttpResponse { status: 301, body: String::new() }.is_success());
        assert!(!HttpResponse { status: 500, body: String::new() }.is_success());
    }

    #[test]
    fn json_decode_error_is_parse_kind() {
        let response = HttpResponse {
            status: 200,
            body: "<html>".into(),
        };
        let err = response.json::<Value>().unwrap_err();
        assert_eq!(err.kind(), FailureKind::Parse);
    }

    #[test]
    fn http_error_display() {
        assert_eq!(
            HttpError::Timeout(Duration::from_millis(1500)).to_string(),
            "request timed out after 1500ms"
        );
        let failure: OpsFailure = HttpError::Request("dns".into()).into();
        assert_eq!(failure.kind, FailureKind::Transport);
        assert_eq!(failure.message, "HTTP request failed: dns");
    }

    #[test]
    fn log_target_hides_path_and_query() {
        assert_eq!(
            log_target("https://discord.com/api/webhooks/1/secret?wait=true"),
            "discord.com"
        );
        assert_eq!(log_target("not a url"), "<invalid url>");
    }

    #[test]
    fn reqwest_transport_builds() {
        assert!(ReqwestTransport::new(Duration::from_secs(5)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_timeout_cancels_hung_call() {
        let fake = FakeTransport::new();
        fake.on(Method::GET, "http://slow", Reply::Hang);
        let client = fake.client();

        let result = client
            .send(HttpRequest::get("http://slow/x").timeout(Some(Duration::from_millis(250))))
            .await;

        assert_matches!(result, Err(HttpError::Timeout(d)) if d == Duration::from_millis(250));
        assert_eq!(fake.call_count(), 1);
    }

    #[tokio::test]
    async fn transport_errors_are_returned_as_values() {
        let fake = FakeTransport::new();
        fake.on(
            Method::POST,
            "http://down",
            Reply::Error(HttpError::Request("connection refused".into())),
        );

        let result = fake
            .client()
            .send(HttpRequest::post_json("http://down/hook", serde_json::json!({})))
            .await;

        assert_matches!(result, Err(HttpError::Request(msg)) if msg == "connection refused");
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_status_with_backoff() {
        let fake = FakeTransport::new();
        fake.on(Method::GET, "http://flaky", Reply::Text(503, "busy".into()));
        let client = fake.client();

        let started = tokio::time::Instant::now();
        let response = client
            .send_with_retry(HttpRequest::get("http://flaky/feed"))
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(fake.call_count(), 3);
        // 1s then 2s between the three attempts.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_error() {
        let fake = FakeTransport::new();
        fake.on_once(
            Method::GET,
            "http://flaky",
            Reply::Error(HttpError::Request("connection reset".into())),
        );
        fake.on(Method::GET, "http://flaky", Reply::Text(200, "ok".into()));

        let response = fake
            .client()
            .send_with_retry(HttpRequest::get("http://flaky/x"))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(fake.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let fake = FakeTransport::new();
        fake.on(Method::GET, "http://auth", Reply::Text(401, String::new()));

        let response = fake
            .client()
            .send_with_retry(HttpRequest::get("http://auth/me"))
            .await
            .unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(fake.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_timeout_bounds_the_whole_retry_sequence() {
        let fake = FakeTransport::new();
        fake.on(Method::GET, "http://flaky", Reply::Text(500, String::new()));
        let client = fake.client();

        let started = tokio::time::Instant::now();
        let result = client
            .send_with_retry(
                HttpRequest::get("http://flaky/x").timeout(Some(Duration::from_millis(1500))),
            )
            .await;

        assert_matches!(result, Err(HttpError::Timeout(d)) if d == Duration::from_millis(1500));
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
        // First attempt, 1s backoff, second attempt, then cancelled during the 2s backoff.
        assert_eq!(fake.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_policy_sends_once() {
        let fake = FakeTransport::new();
        fake.on(Method::GET, "http://flaky", Reply::Text(503, String::new()));

        fake.client()
            .with_retry(RetryPolicy::none())
            .send_with_retry(HttpRequest::get("http://flaky/x"))
            .await
            .unwrap();

        assert_eq!(fake.call_count(), 1);
    }

    #[test]
    fn join_url_encodes_segments() {
        let url = join_url("X", "https://api.airtable.com/v0/", &["app1", "KPI Log"]).unwrap();
        assert_eq!(url.as_str(), "https://api.airtable.com/v0/app1/KPI%20Log");
    }

    #[test]
    fn join_url_rejects_relative_base() {
        let err = join_url("AIRTABLE_API_URL", "api.airtable.com", &["a"]).unwrap_err();
        assert_eq!(err.kind, FailureKind::InvalidConfig);
        assert!(err.message.contains("AIRTABLE_API_URL"));
    }
}
