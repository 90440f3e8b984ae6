use std::sync::Arc;

use krizzy_integrations::Integrations;
use krizzy_worker::ProcessLifecycle;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is behind an `Arc` or is itself a set of
/// `Arc`-backed handles.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Probes, flow triggers and the notifier.
    pub integrations: Integrations,
    /// Start time and heartbeat counter of this process.
    pub lifecycle: Arc<ProcessLifecycle>,
    /// Whether the orchestrator was started in this process.
    pub worker_running: bool,
}
