use std::time::Duration;

use async_trait::async_trait;
use krizzy_core::feed::parse_atom;
use krizzy_core::{EnvReader, FailureKind, OpsFailure, ProbeResult};
use serde_json::json;

use super::Probe;
use crate::http::{HttpClient, HttpRequest};

const DEFAULT_FEED_URL: &str = "https://www.fpds.gov/ezsearch/FEEDS/ATOM?FEEDNAME=PUBLIC";

/// Entries returned by a poll when the caller does not ask for a size.
pub const DEFAULT_SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
}

impl FeedConfig {
    pub fn from_env(env: &EnvReader) -> Self {
        Self {
            url: env.var_or("FPDS_ATOM_FEED", DEFAULT_FEED_URL),
        }
    }
}

/// Polls the procurement ATOM feed and reports its entry count plus a sample.
#[derive(Debug, Clone)]
pub struct FeedProbe {
    client: HttpClient,
    config: FeedConfig,
}

impl FeedProbe {
    pub fn new(client: HttpClient, config: FeedConfig) -> Self {
        Self { client, config }
    }

    /// Fetch the feed and return `{count, sample}` with at most `limit`
    /// entries in `sample`.
    pub async fn poll(&self, limit: usize, timeout: Option<Duration>) -> ProbeResult {
        match self.fetch(limit, timeout).await {
            Ok(result) => result,
            Err(failure) => {
                tracing::warn!(kind = %failure.kind, error = %failure, "Feed poll failed");
                failure.into()
            }
        }
    }

    async fn fetch(&self, limit: usize, timeout: Option<Duration>) -> Result<ProbeResult, OpsFailure> {
        let response = self
            .client
            .send_with_retry(HttpRequest::get(&self.config.url).timeout(timeout))
            .await?;
        if !response.is_success() {
            return Err(OpsFailure::http_status(response.status, &response.body));
        }

        let feed = parse_atom(&response.body)
            .map_err(|e| OpsFailure::new(FailureKind::Parse, e.to_string()))?;
        tracing::debug!(count = feed.count(), limit, "Feed polled");

        Ok(ProbeResult::ok(
            response.status,
            json!({ "count": feed.count(), "sample": feed.sample(limit) }),
        ))
    }
}

#[async_trait]
impl Probe for FeedProbe {
    fn name(&self) -> &'static str {
        "govcon_feed"
    }

    async fn check(&self, timeout: Option<Duration>) -> ProbeResult {
        self.poll(DEFAULT_SAMPLE_SIZE, timeout).await
    }
}
