//! The KRIZZY OPS worker: startup probes, the flow-trigger cycle and the
//! heartbeat, plus the process lifecycle shared with the HTTP surface.

pub mod config;
pub mod guard;
pub mod lifecycle;
pub mod orchestrator;
pub mod signal;
pub mod telemetry;

use std::fmt::Display;
use std::sync::Arc;

use krizzy_core::{ConfigError, EnvReader};
use krizzy_integrations::notifier::NotifierConfig;
use krizzy_integrations::{HttpClient, HttpError, Integrations, Notifier, RetryPolicy};

pub use config::WorkerConfig;
pub use lifecycle::ProcessLifecycle;
pub use orchestrator::{Orchestrator, WorkerHandles};

/// Error that stops the process before it is serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] HttpError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

/// Everything a process needs to run the worker.
pub struct Runtime {
    pub config: WorkerConfig,
    pub integrations: Integrations,
    pub lifecycle: Arc<ProcessLifecycle>,
}

impl Runtime {
    pub fn from_env(env: &EnvReader) -> Result<Self, StartupError> {
        let config = WorkerConfig::from_env(env)?;
        let client = HttpClient::reqwest(config.http_default_timeout)?.with_retry(RetryPolicy {
            max_attempts: config.http_retry_attempts,
            ..Default::default()
        });
        Ok(Self::with_client(env, client, config))
    }

    /// Build the runtime over an existing client (tests inject a fake one).
    pub fn with_client(env: &EnvReader, client: HttpClient, config: WorkerConfig) -> Self {
        let integrations = Integrations::from_env(env, client);
        let lifecycle = Arc::new(ProcessLifecycle::new(integrations.notifier.clone()));
        Self {
            config,
            integrations,
            lifecycle,
        }
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        Orchestrator::new(
            self.integrations.clone(),
            Arc::clone(&self.lifecycle),
            self.config.clone(),
        )
    }
}

/// Report a startup failure to the error channel, then exit with status 1.
pub async fn fail_startup(env: &EnvReader, error: &(dyn Display + Sync)) -> ! {
    match HttpClient::reqwest(config::DEFAULT_HTTP_TIMEOUT) {
        Ok(client) => {
            let notifier = Notifier::new(client, NotifierConfig::from_env(env));
            lifecycle::report_fatal(&notifier, error).await;
        }
        Err(e) => {
            tracing::error!(error = %error, notify_error = %e, "Startup failed");
        }
    }
    std::process::exit(1)
}
