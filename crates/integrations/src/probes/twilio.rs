use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use krizzy_core::{EnvReader, OpsFailure, ProbeResult};
use serde::Deserialize;
use serde_json::json;

use super::Probe;
use crate::http::{join_url, HttpClient, HttpRequest};

const DEFAULT_API_URL: &str = "https://api.twilio.com/2010-04-01";

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub api_url: String,
}

impl TwilioConfig {
    pub fn from_env(env: &EnvReader) -> Self {
        Self {
            account_sid: env.var("TWILIO_ACCOUNT_SID"),
            auth_token: env.var("TWILIO_AUTH_TOKEN"),
            api_url: env.var_or("TWILIO_API_URL", DEFAULT_API_URL),
        }
    }
}

#[derive(Deserialize)]
struct Account {
    sid: String,
    status: String,
}

/// Fetches the account resource to confirm the credentials are live.
#[derive(Debug, Clone)]
pub struct TwilioProbe {
    client: HttpClient,
    config: TwilioConfig,
}

impl TwilioProbe {
    pub fn new(client: HttpClient, config: TwilioConfig) -> Self {
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.account_sid.is_some() && self.config.auth_token.is_some()
    }

    async fn run(&self, timeout: Option<Duration>) -> Result<ProbeResult, OpsFailure> {
        let (Some(sid), Some(token)) = (&self.config.account_sid, &self.config.auth_token) else {
            let mut missing = Vec::new();
            if self.config.account_sid.is_none() {
                missing.push("TWILIO_ACCOUNT_SID".to_string());
            }
            if self.config.auth_token.is_none() {
                missing.push("TWILIO_AUTH_TOKEN".to_string());
            }
            return Err(OpsFailure::missing_config(missing));
        };

        let account_path = format!("{sid}.json");
        let url = join_url(
            "TWILIO_API_URL",
            &self.config.api_url,
            &["Accounts", account_path.as_str()],
        )?;
        let credentials =
            base64::engine::general_purpose::STANDARD.encode(format!("{sid}:{token}"));

        let response = self
            .client
            .send_with_retry(
                HttpRequest::get(url)
                    .header("Authorization", format!("Basic {credentials}"))
                    .timeout(timeout),
            )
            .await?;
        if !response.is_success() {
            return Err(OpsFailure::http_status(response.status, &response.body));
        }

        let account: Account = response.json()?;
        Ok(ProbeResult::ok(
            response.status,
            json!({ "sid": account.sid, "status": account.status }),
        ))
    }
}

#[async_trait]
impl Probe for TwilioProbe {
    fn name(&self) -> &'static str {
        "twilio"
    }

    async fn check(&self, timeout: Option<Duration>) -> ProbeResult {
        self.run(timeout).await.unwrap_or_else(ProbeResult::from)
    }
}
