use krizzy_core::EnvReader;
use krizzy_worker::signal::shutdown_signal;
use krizzy_worker::{fail_startup, telemetry, Runtime};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    telemetry::init_tracing("krizzy_worker=info,krizzy_integrations=info");

    let env = EnvReader::from_process();
    let runtime = match Runtime::from_env(&env) {
        Ok(runtime) => runtime,
        Err(e) => fail_startup(&env, &e).await,
    };
    runtime.lifecycle.install_panic_hook();
    tracing::info!(
        cycle_interval_ms = runtime.config.cycle_interval.as_millis() as u64,
        heartbeat_interval_ms = runtime.config.heartbeat_interval.as_millis() as u64,
        "Worker starting"
    );

    let handles = runtime.orchestrator().start(CancellationToken::new());

    shutdown_signal().await;

    handles.shutdown().await;
    tracing::info!("Worker shutdown complete");
}
