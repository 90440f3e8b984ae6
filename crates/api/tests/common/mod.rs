#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use krizzy_api::config::ServerConfig;
use krizzy_api::state::AppState;
use krizzy_core::EnvReader;
use krizzy_integrations::testing::FakeTransport;
use krizzy_worker::{Runtime, WorkerConfig};
use serde_json::Value;
use tower::ServiceExt;

/// Build the full application over a scripted transport and a fixed
/// environment. The worker is not started.
///
/// This goes through the same `build_app` as `main.rs`, so tests exercise
/// the production middleware stack.
pub fn build_test_app(fake: &Arc<FakeTransport>, pairs: &[(&str, &str)]) -> Router {
    let env = EnvReader::from_pairs(pairs.iter().copied());
    let config = ServerConfig::from_env(&env).unwrap();
    let worker_config = WorkerConfig::from_env(&env).unwrap();
    let runtime = Runtime::with_client(&env, fake.client(), worker_config);

    let state = AppState {
        config: Arc::new(config),
        integrations: runtime.integrations.clone(),
        lifecycle: Arc::clone(&runtime.lifecycle),
        worker_running: false,
    };
    krizzy_api::build_app(state)
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
