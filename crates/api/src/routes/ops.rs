//! Operator endpoints: relay, on-demand probes, manual flow triggers and
//! process status.
//!
//! Every endpoint answers 200 when the underlying outcome is ok and 500
//! otherwise, with the outcome's `{ "ok": ... }` JSON as the body.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use krizzy_integrations::probes::DEFAULT_SAMPLE_SIZE;
use krizzy_integrations::{FeatureFlags, FlowKind, Probe};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

fn outcome_response<T: Serialize>(ok: bool, body: &T) -> Response {
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RelayRequest {
    #[serde(default)]
    pub content: Option<String>,
}

/// POST /ops/relay -- forward `content` to the ops channel.
pub async fn relay(
    State(state): State<AppState>,
    payload: Result<Json<RelayRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = payload?;
    let content = request
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("content is required".to_string()))?;

    let outcome = state.integrations.notifier.notify(&content).await;
    Ok(outcome_response(outcome.is_ok(), &outcome))
}

/// POST /ops/test/discord -- send a test message to the ops channel.
pub async fn test_discord(State(state): State<AppState>) -> Response {
    let message = format!("[TEST] krizzy-ops ping at {}", Utc::now().to_rfc3339());
    let outcome = state.integrations.notifier.notify(&message).await;
    outcome_response(outcome.is_ok(), &outcome)
}

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

async fn run_probe(probe: &dyn Probe) -> Response {
    let result = probe.check(None).await;
    if let Some(failure) = result.failure() {
        tracing::warn!(probe = probe.name(), kind = %failure.kind, error = %failure, "Probe failed");
    }
    outcome_response(result.is_ok(), &result)
}

/// GET /ops/test/airtable
pub async fn test_airtable(State(state): State<AppState>) -> Response {
    run_probe(state.integrations.airtable.as_ref()).await
}

/// GET /ops/test/twilio
pub async fn test_twilio(State(state): State<AppState>) -> Response {
    run_probe(state.integrations.twilio.as_ref()).await
}

/// GET /ops/test/sam
pub async fn test_sam(State(state): State<AppState>) -> Response {
    run_probe(state.integrations.sam.as_ref()).await
}

#[derive(Debug, Deserialize)]
pub struct SampleQuery {
    pub limit: Option<usize>,
}

/// GET /ops/govcon/sample?limit=N -- poll the feed and return a sample.
pub async fn govcon_sample(
    State(state): State<AppState>,
    query: Result<Query<SampleQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_SAMPLE_SIZE);

    let result = state.integrations.feed.poll(limit, None).await;
    Ok(outcome_response(result.is_ok(), &result))
}

// ---------------------------------------------------------------------------
// Flow triggers
// ---------------------------------------------------------------------------

/// POST /ops/trigger/{flow} -- run one flow trigger now.
pub async fn trigger_flow(
    State(state): State<AppState>,
    Path(flow): Path<String>,
) -> AppResult<Response> {
    let kind = FlowKind::from_name(&flow)
        .ok_or_else(|| AppError::NotFound(format!("unknown flow '{flow}'")))?;

    let result = state.integrations.flow(kind).trigger().await;
    tracing::info!(flow = %kind, ok = result.is_ok(), "Manual flow trigger");
    Ok(outcome_response(result.is_ok(), &result))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub ok: bool,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub heartbeats: u64,
    pub worker_running: bool,
    pub features: FeatureFlags,
}

/// GET /ops/status
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.lifecycle.started_at(),
        uptime_secs: state.lifecycle.uptime().as_secs(),
        heartbeats: state.lifecycle.heartbeat_count(),
        worker_running: state.worker_running,
        features: state.integrations.features(),
    })
}
