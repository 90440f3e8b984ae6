//! Process-wide state: start time, heartbeat counter and crash reporting.
//!
//! One [`ProcessLifecycle`] is created per process and shared (via `Arc`)
//! with the orchestrator and the HTTP surface.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use krizzy_integrations::Notifier;
use serde_json::json;

#[derive(Debug)]
pub struct ProcessLifecycle {
    started: Instant,
    started_at: DateTime<Utc>,
    heartbeats: AtomicU64,
    notifier: Notifier,
}

impl ProcessLifecycle {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            heartbeats: AtomicU64::new(0),
            notifier,
        }
    }

    /// Increment the heartbeat counter and return the new value.
    pub fn heartbeat(&self) -> u64 {
        self.heartbeats.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn heartbeat_count(&self) -> u64 {
        self.heartbeats.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Log and notify a steady-state failure the process survives.
    pub async fn report_crash(&self, context: &str, error: &(dyn Display + Sync)) {
        tracing::error!(context, error = %error, "Recovered from failure");
        self.notifier
            .notify_error(
                &format!("{context}: {error}"),
                Some(&json!({
                    "context": context,
                    "uptimeSecs": self.uptime().as_secs(),
                    "heartbeats": self.heartbeat_count(),
                })),
            )
            .await;
    }

    /// Route panics through tracing and the error channel.
    ///
    /// The notification is spawned on the current runtime when there is one;
    /// panics on threads outside a runtime are only logged.
    pub fn install_panic_hook(self: &Arc<Self>) {
        let lifecycle = Arc::clone(self);
        std::panic::set_hook(Box::new(move |info| {
            let message = info.to_string();
            tracing::error!(panic = %message, "Unhandled panic");

            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let lifecycle = Arc::clone(&lifecycle);
                handle.spawn(async move {
                    lifecycle
                        .notifier
                        .notify_error(&format!("[PANIC] {message}"), None)
                        .await;
                });
            }
        }));
    }
}

/// Log and notify a failure that prevents the process from starting.
pub async fn report_fatal(notifier: &Notifier, error: &(dyn Display + Sync)) {
    tracing::error!(error = %error, "Startup failed");
    notifier
        .notify_error(&format!("[FATAL] startup failed: {error}"), None)
        .await;
}
