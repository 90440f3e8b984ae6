use std::time::Duration;

use async_trait::async_trait;
use krizzy_core::{EnvReader, FailureKind, OpsFailure, ProbeResult};
use serde_json::{json, Value};

use super::Probe;
use crate::http::{HttpClient, HttpRequest};

#[derive(Debug, Clone, Default)]
pub struct SamConfig {
    /// Full search URL including the API key and query (`SAM_SEARCH_API`).
    pub search_url: Option<String>,
}

impl SamConfig {
    pub fn from_env(env: &EnvReader) -> Self {
        Self {
            search_url: env.var("SAM_SEARCH_API"),
        }
    }
}

/// Runs the configured SAM.gov opportunity search and reports its hit count.
#[derive(Debug, Clone)]
pub struct SamProbe {
    client: HttpClient,
    config: SamConfig,
}

impl SamProbe {
    pub fn new(client: HttpClient, config: SamConfig) -> Self {
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.search_url.is_some()
    }

    async fn run(&self, timeout: Option<Duration>) -> Result<ProbeResult, OpsFailure> {
        let Some(url) = &self.config.search_url else {
            return Err(OpsFailure::new(
                FailureKind::NotConfigured,
                "SAM_SEARCH_API not set",
            ));
        };

        let response = self
            .client
            .send_with_retry(HttpRequest::get(url).timeout(timeout))
            .await?;
        if !response.is_success() {
            return Err(OpsFailure::http_status(response.status, &response.body));
        }

        let body: Value = response.json()?;
        let total = body.get("totalRecords").cloned().unwrap_or(Value::Null);
        Ok(ProbeResult::ok(response.status, json!({ "totalRecords": total })))
    }
}

#[async_trait]
impl Probe for SamProbe {
    fn name(&self) -> &'static str {
        "sam"
    }

    async fn check(&self, timeout: Option<Duration>) -> ProbeResult {
        self.run(timeout).await.unwrap_or_else(ProbeResult::from)
    }
}
