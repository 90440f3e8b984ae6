use std::sync::Arc;

use krizzy_api::config::ServerConfig;
use krizzy_api::state::AppState;
use krizzy_core::EnvReader;
use krizzy_worker::signal::shutdown_signal;
use krizzy_worker::{fail_startup, telemetry, Runtime, StartupError};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    telemetry::init_tracing(
        "krizzy_api=info,krizzy_worker=info,krizzy_integrations=info,tower_http=info",
    );

    // --- Configuration ---
    let env = EnvReader::from_process();
    let config = match ServerConfig::from_env(&env) {
        Ok(config) => config,
        Err(e) => fail_startup(&env, &e).await,
    };
    let runtime = match Runtime::from_env(&env) {
        Ok(runtime) => runtime,
        Err(e) => fail_startup(&env, &e).await,
    };
    runtime.lifecycle.install_panic_hook();
    tracing::info!(
        addr = %config.socket_addr(),
        autostart = runtime.config.autostart,
        "Loaded server configuration"
    );

    // --- Worker ---
    let worker = if runtime.config.autostart {
        Some(runtime.orchestrator().start(CancellationToken::new()))
    } else {
        tracing::info!("Worker autostart disabled (WORKER_AUTOSTART=false)");
        None
    };

    // --- App state ---
    let addr = config.socket_addr();
    let state = AppState {
        config: Arc::new(config),
        integrations: runtime.integrations.clone(),
        lifecycle: Arc::clone(&runtime.lifecycle),
        worker_running: worker.is_some(),
    };
    let app = krizzy_api::build_app(state);

    // --- Start server ---
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(source) => {
            let e = StartupError::Bind {
                addr: addr.to_string(),
                source,
            };
            fail_startup(&env, &e).await
        }
    };
    tracing::info!(%addr, "Starting server");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        runtime.lifecycle.report_crash("server error", &e).await;
    }

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    if let Some(worker) = worker {
        worker.shutdown().await;
    }
    tracing::info!("Graceful shutdown complete");
}
