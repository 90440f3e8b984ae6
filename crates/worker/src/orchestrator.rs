//! The periodic polling loop.
//!
//! [`Orchestrator::start`] runs the startup probes once, announces the
//! worker, then spawns two independent timers: the flow-trigger cycle and
//! the heartbeat. Both stop when the [`CancellationToken`] held by the
//! returned [`WorkerHandles`] is cancelled.
//!
//! A cycle is awaited before the next tick is taken and missed ticks are
//! skipped, so cycles never overlap. Each cycle runs in its own task: a
//! panicking cycle is reported and the loop carries on. Cancellation aborts
//! a cycle that is still in flight.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use indexmap::IndexMap;
use krizzy_core::{CycleReport, FailureKind, FlowTriggerResult, OpsFailure, ProbeResult};
use krizzy_integrations::{Integrations, Probe};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::guard::FlowGuard;
use crate::lifecycle::ProcessLifecycle;

/// How long shutdown waits for each background task.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Startup probes
// ---------------------------------------------------------------------------

/// Run every probe concurrently, each in its own task and bounded by
/// `timeout`. A probe that panics is reported as a `panicked` failure and
/// does not affect the others.
pub async fn run_probes(
    probes: Vec<Arc<dyn Probe>>,
    timeout: Duration,
) -> IndexMap<&'static str, ProbeResult> {
    let names: Vec<&'static str> = probes.iter().map(|p| p.name()).collect();
    let tasks = probes.into_iter().map(|probe| {
        tokio::spawn(async move { probe.check(Some(timeout)).await })
    });
    let outcomes = join_all(tasks).await;

    names
        .into_iter()
        .zip(outcomes)
        .map(|(name, outcome)| {
            let result = outcome.unwrap_or_else(|e| {
                OpsFailure::new(FailureKind::Panicked, format!("probe task failed: {e}")).into()
            });
            (name, result)
        })
        .collect()
}

fn log_probe_results(results: &IndexMap<&'static str, ProbeResult>) {
    for (name, result) in results {
        match result.failure() {
            None => tracing::info!(probe = name, "Startup probe ok"),
            Some(failure) => tracing::warn!(
                probe = name,
                kind = %failure.kind,
                error = %failure,
                "Startup probe failed"
            ),
        }
    }
    let failed = results.values().filter(|r| !r.is_ok()).count();
    tracing::info!(probes = results.len(), failed, "Startup probes complete");
}

/// One line per probe, e.g. `airtable ok, twilio missing_config`.
fn probe_digest(results: &IndexMap<&'static str, ProbeResult>) -> String {
    results
        .iter()
        .map(|(name, result)| match result.failure() {
            None => format!("{name} ok"),
            Some(failure) => format!("{name} {}", failure.kind),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    integrations: Integrations,
    lifecycle: Arc<ProcessLifecycle>,
    guard: FlowGuard,
    config: WorkerConfig,
}

impl Orchestrator {
    pub fn new(
        integrations: Integrations,
        lifecycle: Arc<ProcessLifecycle>,
        config: WorkerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            integrations,
            lifecycle,
            guard: FlowGuard::new(config.guard),
            config,
        })
    }

    pub fn lifecycle(&self) -> &Arc<ProcessLifecycle> {
        &self.lifecycle
    }

    /// Run the startup probes and log their aggregate.
    pub async fn run_startup_probes(&self) -> IndexMap<&'static str, ProbeResult> {
        let results =
            run_probes(self.integrations.probes(), self.config.startup_probe_timeout).await;
        log_probe_results(&results);
        results
    }

    /// Trigger every flow once and notify if any of them failed.
    ///
    /// Returns the cycle's report; at most one notification is sent per call.
    pub async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let flows = self.integrations.flows();

        let results = join_all(flows.iter().map(|flow| async move {
            let name = flow.kind().name();
            if let Some(suspended) = self.guard.check(name, started) {
                return (name, FlowTriggerResult::from(suspended), false);
            }
            let result = flow.trigger().await;
            let tripped = self.guard.record(name, &result, Instant::now());
            (name, result, tripped)
        }))
        .await;

        let mut report = CycleReport::new();
        let mut tripped = Vec::new();
        for (name, result, trip) in results {
            if trip {
                tripped.push(name);
            }
            report.insert(name, result);
        }

        for (name, result) in report.iter() {
            match result.failure() {
                None => tracing::info!(flow = name, "Flow triggered"),
                Some(failure) => tracing::warn!(
                    flow = name,
                    kind = %failure.kind,
                    error = %failure,
                    "Flow trigger failed"
                ),
            }
        }
        let failed = report.failures().count();
        tracing::info!(
            flows = report.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cycle complete"
        );

        if let Some(mut summary) = report.failure_summary() {
            let disable_secs = self.guard.config().disable_for.as_secs();
            for name in tripped {
                summary.push_str(&format!(
                    "\n{name} suspended for {disable_secs}s after {} consecutive failures",
                    self.guard.config().max_failures
                ));
            }
            let context = serde_json::to_value(&report).ok();
            self.lifecycle
                .notifier()
                .notify_error(&summary, context.as_ref())
                .await;
        }

        report
    }

    /// Advance the heartbeat counter by one and log it.
    pub fn heartbeat_tick(&self) -> u64 {
        let count = self.lifecycle.heartbeat();
        tracing::info!(
            heartbeat = count,
            uptime_secs = self.lifecycle.uptime().as_secs(),
            "Heartbeat"
        );
        count
    }

    /// Spawn the worker: startup probes, then the cycle and heartbeat timers.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> WorkerHandles {
        let cycle = tokio::spawn(Arc::clone(self).run_cycles(cancel.clone()));
        let heartbeat = tokio::spawn(Arc::clone(self).run_heartbeat(cancel.clone()));
        WorkerHandles {
            cancel,
            tasks: vec![("cycle", cycle), ("heartbeat", heartbeat)],
        }
    }

    async fn announce(&self, probes: &IndexMap<&'static str, ProbeResult>) {
        let message = format!(
            "[ONLINE] krizzy-ops worker started; cycle every {}s; probes: {}",
            self.config.cycle_interval.as_secs(),
            probe_digest(probes)
        );
        self.lifecycle.notifier().notify(&message).await;
    }

    async fn run_cycles(self: Arc<Self>, cancel: CancellationToken) {
        let probes = tokio::select! {
            _ = cancel.cancelled() => return,
            probes = self.run_startup_probes() => probes,
        };
        self.announce(&probes).await;

        let period = self.config.cycle_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval_ms = period.as_millis() as u64, "Cycle timer started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Cycle timer stopping");
                    break;
                }
                _ = interval.tick() => {
                    let orchestrator = Arc::clone(&self);
                    let mut cycle = tokio::spawn(async move {
                        orchestrator.run_cycle().await;
                    });
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::warn!("Cycle cancelled by shutdown");
                            cycle.abort();
                            let _ = cycle.await;
                            break;
                        }
                        outcome = &mut cycle => {
                            if let Err(e) = outcome {
                                self.lifecycle
                                    .report_crash("cycle task failed", &e.to_string())
                                    .await;
                            }
                        }
                    }
                }
            }
        }
    }

    async fn run_heartbeat(self: Arc<Self>, cancel: CancellationToken) {
        let period = self.config.heartbeat_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Heartbeat timer stopping");
                    break;
                }
                _ = interval.tick() => {
                    self.heartbeat_tick();
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Owned handles of the running worker tasks.
pub struct WorkerHandles {
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl WorkerHandles {
    /// Cancel every task and wait (bounded) for each to finish. A task still
    /// running after the grace period is aborted.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for (name, mut handle) in self.tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(Ok(())) => tracing::info!(task = name, "Worker task stopped"),
                Ok(Err(e)) => tracing::error!(task = name, error = %e, "Worker task failed"),
                Err(_) => {
                    tracing::warn!(task = name, "Worker task did not stop in time, aborting");
                    handle.abort();
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
