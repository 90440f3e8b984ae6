//! Integration tests for the `/ops` endpoints.

mod common;

use axum::body::Body;
use axum::http::{header, Method as HttpMethod, Request, StatusCode};
use common::{body_json, build_test_app, get, post, post_json, send};
use krizzy_integrations::testing::{FakeTransport, Reply};
use reqwest::Method;
use serde_json::json;

const OPS_HOOK: &str = "https://discord.test/ops";
const FEED: &str = "https://feed.test/atom";

fn atom(entries: usize) -> String {
    let mut xml = String::from(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#);
    for i in 0..entries {
        xml.push_str(&format!("<entry><title>Award {i}</title><id>urn:{i}</id></entry>"));
    }
    xml.push_str("</feed>");
    xml
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

#[tokio::test]
async fn relay_without_webhook_is_500_not_configured() {
    let fake = FakeTransport::new();
    let app = build_test_app(&fake, &[]);

    let response = post_json(app, "/ops/relay", json!({ "content": "hello" })).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json, json!({ "ok": false, "error": "not configured" }));
    assert_eq!(fake.call_count(), 0);
}

#[tokio::test]
async fn relay_delivers_content() {
    let fake = FakeTransport::new();
    fake.on(Method::POST, OPS_HOOK, Reply::Text(204, String::new()));
    let app = build_test_app(&fake, &[("DISCORD_WEBHOOK_OPS", OPS_HOOK)]);

    let response = post_json(app, "/ops/relay", json!({ "content": "deal closed" })).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "ok": true, "status": 204 }));
    assert_eq!(fake.calls()[0].body, Some(json!({ "content": "deal closed" })));
}

#[tokio::test]
async fn relay_rejects_blank_or_missing_content() {
    let fake = FakeTransport::new();
    let pairs = [("DISCORD_WEBHOOK_OPS", OPS_HOOK)];

    let response = post_json(
        build_test_app(&fake, &pairs),
        "/ops/relay",
        json!({ "content": "   " }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "content is required");

    let response = post_json(build_test_app(&fake, &pairs), "/ops/relay", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(fake.call_count(), 0);
}

#[tokio::test]
async fn relay_rejects_malformed_json() {
    let app = build_test_app(&FakeTransport::new(), &[]);
    let request = Request::builder()
        .method(HttpMethod::POST)
        .uri("/ops/relay")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn airtable_without_credentials_is_500_with_missing_names() {
    let fake = FakeTransport::new();
    let app = build_test_app(&fake, &[]);

    let response = get(app, "/ops/test/airtable").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["ok"], false);
    assert_eq!(json["errorKind"], "missing_config");
    assert_eq!(
        json["missingConfig"],
        json!(["AIRTABLE_API_KEY", "AIRTABLE_BASE_ID"])
    );
    assert_eq!(fake.call_count(), 0);
}

#[tokio::test]
async fn twilio_probe_ok_is_200() {
    let fake = FakeTransport::new();
    fake.on(
        Method::GET,
        "https://tw.test/Accounts/AC1.json",
        Reply::Json(200, json!({ "sid": "AC1", "status": "active" })),
    );
    let app = build_test_app(
        &fake,
        &[
            ("TWILIO_ACCOUNT_SID", "AC1"),
            ("TWILIO_AUTH_TOKEN", "t"),
            ("TWILIO_API_URL", "https://tw.test"),
        ],
    );

    let response = get(app, "/ops/test/twilio").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"], json!({ "sid": "AC1", "status": "active" }));
}

#[tokio::test]
async fn sam_without_search_url_is_not_configured() {
    let app = build_test_app(&FakeTransport::new(), &[]);

    let response = get(app, "/ops/test/sam").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "SAM_SEARCH_API not set");
}

#[tokio::test]
async fn discord_test_message_uses_ops_channel() {
    let fake = FakeTransport::new();
    fake.on(Method::POST, OPS_HOOK, Reply::Text(200, String::new()));
    let app = build_test_app(&fake, &[("DISCORD_OPS_WEBHOOK_URL", OPS_HOOK)]);

    let response = post(app, "/ops/test/discord").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = fake.calls()[0].body.clone().unwrap();
    assert!(body["content"].as_str().unwrap().starts_with("[TEST]"));
}

// ---------------------------------------------------------------------------
// Feed sample
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sample_limit_caps_entries_but_not_count() {
    let fake = FakeTransport::new();
    fake.on(Method::GET, FEED, Reply::Text(200, atom(10)));
    let app = build_test_app(&fake, &[("FPDS_ATOM_FEED", FEED)]);

    let response = get(app, "/ops/govcon/sample?limit=2").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["data"]["count"], 10);
    assert_eq!(json["data"]["sample"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn sample_defaults_to_five() {
    let fake = FakeTransport::new();
    fake.on(Method::GET, FEED, Reply::Text(200, atom(10)));
    let app = build_test_app(&fake, &[("FPDS_ATOM_FEED", FEED)]);

    let json = body_json(get(app, "/ops/govcon/sample").await).await;

    assert_eq!(json["data"]["sample"].as_array().unwrap().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn sample_feed_outage_reports_status() {
    let fake = FakeTransport::new();
    fake.on(Method::GET, FEED, Reply::Text(503, String::new()));
    let app = build_test_app(&fake, &[("FPDS_ATOM_FEED", FEED)]);

    let response = get(app, "/ops/govcon/sample").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["ok"], false);
    assert_eq!(json["status"], 503);
    assert_eq!(fake.calls_to(FEED), 3);
}

#[tokio::test]
async fn sample_rejects_non_numeric_limit() {
    let fake = FakeTransport::new();
    let app = build_test_app(&fake, &[("FPDS_ATOM_FEED", FEED)]);

    let response = get(app, "/ops/govcon/sample?limit=lots").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(fake.call_count(), 0);
}

// ---------------------------------------------------------------------------
// Flow triggers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn govcon_trigger_fires_webhook() {
    let fake = FakeTransport::new();
    fake.on(Method::POST, "https://hooks.test/govcon", Reply::Text(200, String::new()));
    let app = build_test_app(&fake, &[("GOVCON_WEBHOOK_URL", "https://hooks.test/govcon")]);

    let response = post(app, "/ops/trigger/govcon").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "ok": true, "status": 200 }));
}

#[tokio::test]
async fn rei_trigger_without_routes_is_500() {
    let app = build_test_app(&FakeTransport::new(), &[]);

    let response = post(app, "/ops/trigger/rei").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["error"],
        "WORKFLOW_ENGINE_URL not set"
    );
}

#[tokio::test]
async fn unknown_flow_is_404() {
    let app = build_test_app(&FakeTransport::new(), &[]);

    let response = post(app, "/ops/trigger/payroll").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_reports_lifecycle_and_features() {
    let app = build_test_app(
        &FakeTransport::new(),
        &[("DISCORD_WEBHOOK_OPS", OPS_HOOK), ("REI_WEBHOOK_URL", "https://hooks.test/rei")],
    );

    let response = get(app, "/ops/status").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["heartbeats"], 0);
    assert_eq!(json["workerRunning"], false);
    assert_eq!(json["features"]["discord"], true);
    assert_eq!(json["features"]["rei"], true);
    assert_eq!(json["features"]["airtable"], false);
    assert!(json["startedAt"].is_string());
}
