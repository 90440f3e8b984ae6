//! Per-flow circuit breaker.
//!
//! After `max_failures` consecutive failed triggers a flow is suspended for
//! `disable_for`; while suspended the cycle reports it as `suspended`
//! without calling out. The first trigger after the suspension elapses
//! starts a fresh count. `max_failures = 0` disables the guard.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use krizzy_core::{FailureKind, FlowTriggerResult, OpsFailure};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardConfig {
    pub max_failures: u32,
    pub disable_for: Duration,
}

impl GuardConfig {
    pub fn enabled(&self) -> bool {
        self.max_failures > 0
    }
}

#[derive(Debug, Default)]
struct FlowState {
    consecutive_failures: u32,
    suspended_until: Option<Instant>,
}

#[derive(Debug)]
pub struct FlowGuard {
    config: GuardConfig,
    flows: Mutex<HashMap<&'static str, FlowState>>,
}

impl FlowGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            flows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> GuardConfig {
        self.config
    }

    /// `Some(failure)` while `flow` is suspended.
    pub fn check(&self, flow: &'static str, now: Instant) -> Option<OpsFailure> {
        if !self.config.enabled() {
            return None;
        }
        let mut flows = self.flows.lock().unwrap_or_else(|e| e.into_inner());
        let state = flows.get_mut(flow)?;
        let until = state.suspended_until?;
        if now >= until {
            *state = FlowState::default();
            tracing::info!(flow, "Flow guard: suspension lifted");
            return None;
        }
        let remaining = until.saturating_duration_since(now).as_secs();
        Some(OpsFailure::new(
            FailureKind::Suspended,
            format!(
                "suspended after {} consecutive failures; resumes in {remaining}s",
                self.config.max_failures
            ),
        ))
    }

    /// Record the outcome of a trigger that actually ran. Returns `true` when
    /// this failure trips the guard.
    pub fn record(&self, flow: &'static str, result: &FlowTriggerResult, now: Instant) -> bool {
        if !self.config.enabled() {
            return false;
        }
        let mut flows = self.flows.lock().unwrap_or_else(|e| e.into_inner());
        let state = flows.entry(flow).or_default();
        if result.is_ok() {
            state.consecutive_failures = 0;
            return false;
        }

        state.consecutive_failures += 1;
        if state.consecutive_failures < self.config.max_failures {
            return false;
        }
        state.suspended_until = Some(now + self.config.disable_for);
        tracing::warn!(
            flow,
            failures = state.consecutive_failures,
            disable_secs = self.config.disable_for.as_secs(),
            "Flow guard tripped"
        );
        true
    }
}
