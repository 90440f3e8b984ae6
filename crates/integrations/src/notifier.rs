//! Best-effort delivery of operator messages to Discord webhooks.
//!
//! [`Notifier`] never fails its caller: a missing webhook, a rejected
//! message and a network error are all reported through [`NotifyOutcome`]
//! and logged, so notification problems can never take down a cycle.
//! Posts are retried with backoff on network errors, `429` and `5xx`.

use krizzy_core::text::truncate_chars;
use krizzy_core::EnvReader;
use serde::Serialize;
use serde_json::{json, Value};

use crate::http::{HttpClient, HttpRequest};

/// Discord rejects message content longer than this.
const MAX_CONTENT_CHARS: usize = 2000;

/// Discord embed description limit.
const MAX_EMBED_CHARS: usize = 4096;

/// Webhook destinations, read from `DISCORD_WEBHOOK_OPS` and
/// `DISCORD_WEBHOOK_ERRORS` (or their legacy aliases).
#[derive(Debug, Clone, Default)]
pub struct NotifierConfig {
    pub ops_webhook: Option<String>,
    /// Falls back to the ops webhook when unset.
    pub errors_webhook: Option<String>,
}

impl NotifierConfig {
    pub fn from_env(env: &EnvReader) -> Self {
        Self {
            ops_webhook: env.var("DISCORD_WEBHOOK_OPS"),
            errors_webhook: env.var("DISCORD_WEBHOOK_ERRORS"),
        }
    }
}

/// Result of one notification attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyOutcome {
    Delivered { status: u16 },
    /// No destination configured; nothing was sent.
    NotConfigured,
    /// The webhook answered with a non-2xx status.
    Rejected { status: u16, body: String },
    /// The webhook could not be reached.
    Failed { error: String },
}

impl NotifyOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, NotifyOutcome::Delivered { .. })
    }
}

#[derive(Serialize)]
struct NotifyWire<'a> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for NotifyOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            NotifyOutcome::Delivered { status } => NotifyWire {
                ok: true,
                status: Some(*status),
                body: None,
                error: None,
            },
            NotifyOutcome::NotConfigured => NotifyWire {
                ok: false,
                status: None,
                body: None,
                error: Some("not configured"),
            },
            NotifyOutcome::Rejected { status, body } => NotifyWire {
                ok: false,
                status: Some(*status),
                body: Some(body),
                error: None,
            },
            NotifyOutcome::Failed { error } => NotifyWire {
                ok: false,
                status: None,
                body: None,
                error: Some(error),
            },
        };
        wire.serialize(serializer)
    }
}

/// Sends plaintext (optionally with a JSON context embed) to the ops channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    client: HttpClient,
    config: NotifierConfig,
}

impl Notifier {
    pub fn new(client: HttpClient, config: NotifierConfig) -> Self {
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.ops_webhook.is_some()
    }

    /// Post `message` to the ops channel.
    pub async fn notify(&self, message: &str) -> NotifyOutcome {
        let payload = json!({ "content": truncate_chars(message, MAX_CONTENT_CHARS) });
        self.post("ops", self.config.ops_webhook.as_deref(), payload)
            .await
    }

    /// Post an error to the errors channel (ops channel if unset), attaching
    /// `context` as a pretty-printed embed.
    pub async fn notify_error(&self, message: &str, context: Option<&Value>) -> NotifyOutcome {
        let content = truncate_chars(&format!("[ERROR] {message}"), MAX_CONTENT_CHARS);
        let mut payload = json!({ "content": content });
        if let Some(context) = context {
            let description = serde_json::to_string_pretty(context)
                .unwrap_or_else(|_| context.to_string());
            payload["embeds"] = json!([{
                "description": truncate_chars(&description, MAX_EMBED_CHARS),
            }]);
        }

        let url = self
            .config
            .errors_webhook
            .as_deref()
            .or(self.config.ops_webhook.as_deref());
        self.post("errors", url, payload).await
    }

    async fn post(&self, channel: &'static str, url: Option<&str>, payload: Value) -> NotifyOutcome {
        let Some(url) = url else {
            tracing::debug!(channel, "Ops notification skipped: webhook not configured");
            return NotifyOutcome::NotConfigured;
        };

        match self.client.send_with_retry(HttpRequest::post_json(url, payload)).await {
            Ok(response) if response.is_success() => NotifyOutcome::Delivered {
                status: response.status,
            },
            Ok(response) => {
                tracing::warn!(channel, status = response.status, "Ops notification rejected");
                NotifyOutcome::Rejected {
                    status: response.status,
                    body: response.body,
                }
            }
            Err(e) => {
                tracing::warn!(channel, error = %e, "Ops notification failed");
                NotifyOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
