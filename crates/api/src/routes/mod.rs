pub mod health;
pub mod ops;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the `/ops` route tree.
///
/// ```text
/// /relay                 POST  forward {content} to the ops channel
/// /test/discord          POST  send a test message
/// /test/airtable         GET   Airtable probe
/// /test/twilio           GET   Twilio probe
/// /test/sam              GET   SAM search probe
/// /trigger/{flow}        POST  run the rei / govcon flow trigger
/// /govcon/sample         GET   feed poll, ?limit=N (default 5)
/// /status                GET   uptime, heartbeats, configured features
/// ```
pub fn ops_routes() -> Router<AppState> {
    Router::new()
        .route("/relay", post(ops::relay))
        .route("/test/discord", post(ops::test_discord))
        .route("/test/airtable", get(ops::test_airtable))
        .route("/test/twilio", get(ops::test_twilio))
        .route("/test/sam", get(ops::test_sam))
        .route("/trigger/{flow}", post(ops::trigger_flow))
        .route("/govcon/sample", get(ops::govcon_sample))
        .route("/status", get(ops::status))
}
