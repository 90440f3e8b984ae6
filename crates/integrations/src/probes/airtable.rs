use std::time::Duration;

use async_trait::async_trait;
use krizzy_core::{EnvReader, FailureKind, OpsFailure, ProbeResult};
use serde_json::{json, Value};

use super::Probe;
use crate::http::{join_url, HttpClient, HttpRequest};

const DEFAULT_API_URL: &str = "https://api.airtable.com/v0";
const DEFAULT_TABLE: &str = "KPI_Log";

#[derive(Debug, Clone)]
pub struct AirtableConfig {
    pub api_key: Option<String>,
    pub base_id: Option<String>,
    /// Table probed for read access (`AIRTABLE_TABLE_KPI_LOG`).
    pub table: String,
    pub api_url: String,
}

impl AirtableConfig {
    pub fn from_env(env: &EnvReader) -> Self {
        Self {
            api_key: env.var("AIRTABLE_API_KEY"),
            base_id: env.var("AIRTABLE_BASE_ID"),
            table: env.var_or("AIRTABLE_TABLE_KPI_LOG", DEFAULT_TABLE),
            api_url: env.var_or("AIRTABLE_API_URL", DEFAULT_API_URL),
        }
    }
}

/// Reads one record from the KPI table to prove the key can see the base.
#[derive(Debug, Clone)]
pub struct AirtableProbe {
    client: HttpClient,
    config: AirtableConfig,
}

impl AirtableProbe {
    pub fn new(client: HttpClient, config: AirtableConfig) -> Self {
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some() && self.config.base_id.is_some()
    }

    async fn run(&self, timeout: Option<Duration>) -> Result<ProbeResult, OpsFailure> {
        let (Some(api_key), Some(base_id)) = (&self.config.api_key, &self.config.base_id) else {
            let mut missing = Vec::new();
            if self.config.api_key.is_none() {
                missing.push("AIRTABLE_API_KEY".to_string());
            }
            if self.config.base_id.is_none() {
                missing.push("AIRTABLE_BASE_ID".to_string());
            }
            return Err(OpsFailure::missing_config(missing));
        };

        // A pasted share link instead of the `app...` id.
        if base_id.starts_with("http") {
            return Err(OpsFailure::new(
                FailureKind::InvalidConfig,
                "AIRTABLE_BASE_ID must be a base id, not a URL",
            ));
        }

        let mut url = join_url(
            "AIRTABLE_API_URL",
            &self.config.api_url,
            &[base_id.as_str(), self.config.table.as_str()],
        )?;
        url.query_pairs_mut().append_pair("maxRecords", "1");

        let response = self
            .client
            .send_with_retry(HttpRequest::get(url).bearer(api_key).timeout(timeout))
            .await?;
        if !response.is_success() {
            return Err(OpsFailure::http_status(response.status, &response.body));
        }

        let body: Value = response.json()?;
        let records = body
            .get("records")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);

        Ok(ProbeResult::ok(
            response.status,
            json!({ "table": self.config.table, "records": records }),
        ))
    }
}

#[async_trait]
impl Probe for AirtableProbe {
    fn name(&self) -> &'static str {
        "airtable"
    }

    async fn check(&self, timeout: Option<Duration>) -> ProbeResult {
        self.run(timeout).await.unwrap_or_else(ProbeResult::from)
    }
}
