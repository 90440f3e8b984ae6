//! Flow triggers: ask the workflow engine to run the REI or GovCon flow.
//!
//! A flow is started through the first route that is configured:
//!
//! 1. its dedicated webhook (`REI_WEBHOOK_URL` / `GOVCON_WEBHOOK_URL`);
//! 2. the workflow engine API (`WORKFLOW_ENGINE_URL`), resolving the
//!    workflow id by name marker from a single list call;
//! 3. otherwise the trigger reports `WORKFLOW_ENGINE_URL not set`.
//!
//! Marker matching is first-match over the engine's list order.

use std::fmt;

use krizzy_core::{EnvReader, FailureKind, FlowTriggerResult, OpsFailure};
use serde::Deserialize;
use serde_json::json;

use crate::http::{join_url, HttpClient, HttpRequest};
use crate::notifier::Notifier;

/// Header the workflow engine reads its API key from.
const API_KEY_HEADER: &str = "X-N8N-API-KEY";

// ---------------------------------------------------------------------------
// Flow kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    /// Real-estate disposition.
    Rei,
    /// Government contracting.
    Govcon,
}

impl FlowKind {
    pub const ALL: [FlowKind; 2] = [FlowKind::Rei, FlowKind::Govcon];

    pub fn name(&self) -> &'static str {
        match self {
            FlowKind::Rei => "rei",
            FlowKind::Govcon => "govcon",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Environment variable holding the flow's dedicated webhook.
    pub fn webhook_env(&self) -> &'static str {
        match self {
            FlowKind::Rei => "REI_WEBHOOK_URL",
            FlowKind::Govcon => "GOVCON_WEBHOOK_URL",
        }
    }

    /// Workflow name markers, primary first.
    pub fn markers(&self) -> [&'static str; 2] {
        match self {
            FlowKind::Rei => ["REI_DISPO", "REI"],
            FlowKind::Govcon => ["GOVCON_SUBTRAP", "GOVCON"],
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Workflow engine API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct WorkflowEngineConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl WorkflowEngineConfig {
    pub fn from_env(env: &EnvReader) -> Self {
        Self {
            base_url: env.var("WORKFLOW_ENGINE_URL"),
            api_key: env.var("WORKFLOW_ENGINE_API_KEY"),
        }
    }
}

/// The list endpoint answers either `{ "data": [...] }` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum WorkflowList {
    Wrapped { data: Vec<Workflow> },
    Bare(Vec<Workflow>),
}

impl WorkflowList {
    fn into_vec(self) -> Vec<Workflow> {
        match self {
            WorkflowList::Wrapped { data } => data,
            WorkflowList::Bare(list) => list,
        }
    }
}

#[derive(Deserialize)]
struct Workflow {
    id: WorkflowId,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WorkflowId {
    Text(String),
    Number(i64),
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowId::Text(id) => f.write_str(id),
            WorkflowId::Number(id) => write!(f, "{id}"),
        }
    }
}

/// First workflow whose name contains the primary marker, else the first
/// containing the fallback marker.
fn select_workflow<'a>(workflows: &'a [Workflow], markers: &[&str]) -> Option<&'a Workflow> {
    markers
        .iter()
        .find_map(|marker| workflows.iter().find(|w| w.name.contains(marker)))
}

// ---------------------------------------------------------------------------
// FlowTrigger
// ---------------------------------------------------------------------------

/// Starts one flow. Always returns a [`FlowTriggerResult`].
#[derive(Debug, Clone)]
pub struct FlowTrigger {
    kind: FlowKind,
    client: HttpClient,
    webhook_url: Option<String>,
    engine: WorkflowEngineConfig,
    notifier: Notifier,
}

impl FlowTrigger {
    pub fn new(
        kind: FlowKind,
        client: HttpClient,
        webhook_url: Option<String>,
        engine: WorkflowEngineConfig,
        notifier: Notifier,
    ) -> Self {
        Self {
            kind,
            client,
            webhook_url,
            engine,
            notifier,
        }
    }

    pub fn from_env(
        kind: FlowKind,
        env: &EnvReader,
        client: HttpClient,
        notifier: Notifier,
    ) -> Self {
        Self::new(
            kind,
            client,
            env.var(kind.webhook_env()),
            WorkflowEngineConfig::from_env(env),
            notifier,
        )
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    /// Whether either the webhook or the engine route is available.
    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some() || self.engine.base_url.is_some()
    }

    pub async fn trigger(&self) -> FlowTriggerResult {
        if let Some(url) = &self.webhook_url {
            return self
                .fire_webhook(url)
                .await
                .unwrap_or_else(FlowTriggerResult::from);
        }

        let Some(base_url) = &self.engine.base_url else {
            return OpsFailure::new(FailureKind::NotConfigured, "WORKFLOW_ENGINE_URL not set")
                .into();
        };

        match self.run_via_engine(base_url).await {
            Ok(result) => result,
            Err(failure) => {
                if matches!(
                    failure.kind,
                    FailureKind::Transport | FailureKind::Timeout | FailureKind::Parse
                ) {
                    tracing::error!(
                        flow = %self.kind,
                        kind = %failure.kind,
                        error = %failure,
                        "Workflow engine call failed"
                    );
                    self.notifier
                        .notify_error(
                            &format!("{} trigger failed: {failure}", self.kind),
                            Some(&json!({ "flow": self.kind.name(), "error": failure.message })),
                        )
                        .await;
                }
                failure.into()
            }
        }
    }

    fn payload(&self) -> serde_json::Value {
        json!({
            "ts": chrono::Utc::now().to_rfc3339(),
            "source": format!("krizzy-ops:{}", self.kind),
        })
    }

    async fn fire_webhook(&self, url: &str) -> Result<FlowTriggerResult, OpsFailure> {
        let response = self
            .client
            .send(HttpRequest::post_json(url, self.payload()))
            .await?;
        if !response.is_success() {
            return Err(OpsFailure::http_status(response.status, &response.body));
        }
        tracing::info!(flow = %self.kind, status = response.status, "Flow webhook fired");
        Ok(FlowTriggerResult::Ok {
            status: response.status,
            workflow_id: None,
        })
    }

    fn engine_request(&self, request: HttpRequest) -> HttpRequest {
        match &self.engine.api_key {
            Some(key) => request.header(API_KEY_HEADER, key.clone()),
            None => request,
        }
    }

    async fn run_via_engine(&self, base_url: &str) -> Result<FlowTriggerResult, OpsFailure> {
        let list_url = join_url("WORKFLOW_ENGINE_URL", base_url, &["workflows"])?;
        let response = self
            .client
            .send(self.engine_request(HttpRequest::get(list_url)))
            .await?;
        if !response.is_success() {
            return Err(OpsFailure::http_status(response.status, &response.body));
        }

        let workflows = response.json::<WorkflowList>()?.into_vec();
        let markers = self.kind.markers();
        let Some(workflow) = select_workflow(&workflows, &markers) else {
            return Err(OpsFailure::new(
                FailureKind::NotFound,
                format!("workflow matching '{}' or '{}' not found", markers[0], markers[1]),
            ));
        };

        let workflow_id = workflow.id.to_string();
        let run_url = join_url(
            "WORKFLOW_ENGINE_URL",
            base_url,
            &["workflows", workflow_id.as_str(), "run"],
        )?;
        let response = self
            .client
            .send(self.engine_request(HttpRequest::post_json(run_url, self.payload())))
            .await?;
        if !response.is_success() {
            return Err(OpsFailure::http_status(response.status, &response.body));
        }

        tracing::info!(
            flow = %self.kind,
            workflow_id = %workflow_id,
            workflow = %workflow.name,
            "Workflow run requested"
        );
        Ok(FlowTriggerResult::Ok {
            status: response.status,
            workflow_id: Some(workflow_id),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpError;
    use crate::notifier::NotifierConfig;
    use crate::testing::{FakeTransport, Reply};
    use assert_matches::assert_matches;
    use reqwest::Method;
    use std::sync::Arc;

    const ENGINE: &str = "https://engine.test/api/v1";
    const ERRORS_HOOK: &str = "https://discord.test/errors";

    fn trigger(fake: &Arc<FakeTransport>, kind: FlowKind, pairs: &[(&str, &str)]) -> FlowTrigger {
        let env = EnvReader::from_pairs(pairs.iter().copied());
        let notifier = Notifier::new(
            fake.client(),
            NotifierConfig {
                ops_webhook: None,
                errors_webhook: Some(ERRORS_HOOK.into()),
            },
        );
        FlowTrigger::from_env(kind, &env, fake.client(), notifier)
    }

    #[test]
    fn flow_names_round_trip() {
        for kind in FlowKind::ALL {
            assert_eq!(FlowKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(FlowKind::from_name("other"), None);
    }

    #[tokio::test]
    async fn webhook_path_never_lists_workflows() {
        let fake = FakeTransport::new();
        fake.on(Method::POST, "https://hooks.test/rei", Reply::Text(200, "ok".into()));
        let rei = trigger(
            &fake,
            FlowKind::Rei,
            &[
                ("REI_WEBHOOK_URL", "https://hooks.test/rei"),
                ("WORKFLOW_ENGINE_URL", ENGINE),
            ],
        );

        let result = rei.trigger().await;

        assert_eq!(
            result,
            FlowTriggerResult::Ok {
                status: 200,
                workflow_id: None
            }
        );
        assert_eq!(fake.calls_to(ENGINE), 0);
        let body = fake.calls()[0].body.clone().unwrap();
        assert_eq!(body["source"], "krizzy-ops:rei");
        assert!(body["ts"].as_str().is_some());
    }

    #[tokio::test]
    async fn engine_path_lists_once_and_runs_matched_workflow() {
        let fake = FakeTransport::new();
        fake.on(
            Method::GET,
            "https://engine.test/api/v1/workflows",
            Reply::Json(
                200,
                json!({ "data": [
                    { "id": "1", "name": "REI_DISPO_DAILY" },
                    { "id": "7", "name": "GOVCON_NIGHTLY" },
                ]}),
            ),
        );
        fake.on(
            Method::POST,
            "https://engine.test/api/v1/workflows/7/run",
            Reply::Json(200, json!({ "executionId": "e1" })),
        );
        let govcon = trigger(
            &fake,
            FlowKind::Govcon,
            &[("N8N_BASE_URL", ENGINE), ("N8N_API_KEY", "k")],
        );

        let result = govcon.trigger().await;

        assert_eq!(
            result,
            FlowTriggerResult::Ok {
                status: 200,
                workflow_id: Some("7".into())
            }
        );
        let calls = fake.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls.iter().filter(|c| c.method == Method::GET).count(), 1);
        assert!(calls[0]
            .headers
            .contains(&(API_KEY_HEADER.to_string(), "k".to_string())));
    }

    #[tokio::test]
    async fn primary_marker_wins_over_list_order() {
        let fake = FakeTransport::new();
        fake.on(
            Method::GET,
            "https://engine.test/api/v1/workflows",
            Reply::Json(
                200,
                json!([
                    { "id": 3, "name": "GOVCON_NIGHTLY" },
                    { "id": 9, "name": "GOVCON_SUBTRAP_SYNC" },
                ]),
            ),
        );
        fake.on(Method::POST, ENGINE, Reply::Text(200, String::new()));
        let govcon = trigger(&fake, FlowKind::Govcon, &[("WORKFLOW_ENGINE_URL", ENGINE)]);

        let result = govcon.trigger().await;

        assert_matches!(result, FlowTriggerResult::Ok { workflow_id: Some(ref id), .. } if id == "9");
    }

    #[tokio::test]
    async fn no_matching_workflow_is_not_found() {
        let fake = FakeTransport::new();
        fake.on(
            Method::GET,
            ENGINE,
            Reply::Json(200, json!({ "data": [{ "id": "1", "name": "Other" }] })),
        );
        let rei = trigger(&fake, FlowKind::Rei, &[("WORKFLOW_ENGINE_URL", ENGINE)]);

        let result = rei.trigger().await;

        let failure = result.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::NotFound);
        assert!(failure.message.ends_with("not found"));
        assert!(failure.message.contains("REI_DISPO"));
        assert_eq!(fake.calls_to(ERRORS_HOOK), 0);
    }

    #[tokio::test]
    async fn nothing_configured_reports_engine_url() {
        let fake = FakeTransport::new();
        let rei = trigger(&fake, FlowKind::Rei, &[]);

        let result = rei.trigger().await;

        let wire = serde_json::to_value(&result).unwrap();
        assert_eq!(wire["ok"], false);
        assert_eq!(wire["error"], "WORKFLOW_ENGINE_URL not set");
        assert_eq!(fake.call_count(), 0);
        assert!(!rei.is_configured());
    }

    #[tokio::test]
    async fn engine_transport_error_is_notified() {
        let fake = FakeTransport::new();
        fake.on(
            Method::GET,
            ENGINE,
            Reply::Error(HttpError::Request("connection refused".into())),
        );
        fake.on(Method::POST, ERRORS_HOOK, Reply::Text(204, String::new()));
        let govcon = trigger(&fake, FlowKind::Govcon, &[("WORKFLOW_ENGINE_URL", ENGINE)]);

        let result = govcon.trigger().await;

        assert_eq!(result.failure().unwrap().kind, FailureKind::Transport);
        assert_eq!(fake.calls_to(ERRORS_HOOK), 1);
        let notified = fake.calls().last().unwrap().body.clone().unwrap();
        assert!(notified["content"]
            .as_str()
            .unwrap()
            .contains("connection refused"));
    }

    #[tokio::test]
    async fn garbage_list_body_is_parse_failure() {
        let fake = FakeTransport::new();
        fake.on(Method::GET, ENGINE, Reply::Text(200, "<html/>".into()));
        fake.on(Method::POST, ERRORS_HOOK, Reply::Text(204, String::new()));
        let rei = trigger(&fake, FlowKind::Rei, &[("WORKFLOW_ENGINE_URL", ENGINE)]);

        let result = rei.trigger().await;

        assert_eq!(result.failure().unwrap().kind, FailureKind::Parse);
        assert_eq!(fake.calls_to(ERRORS_HOOK), 1);
    }
}
