use axum::{routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

/// Liveness payload.
#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub ts: DateTime<Utc>,
}

/// GET /health -- always `{ok: true}` while the process is serving.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        ts: Utc::now(),
    })
}

/// Mount health check routes at the root level.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
