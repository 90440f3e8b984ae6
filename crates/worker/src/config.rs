use std::time::Duration;

use krizzy_core::{ConfigError, EnvReader};
use krizzy_integrations::RetryPolicy;

use crate::guard::GuardConfig;

/// Transport timeout used when `HTTP_DEFAULT_TIMEOUT_MS` is unset, and for
/// reporting a startup failure before configuration could be read.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Worker timing and feature configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Period between flow-trigger cycles (default: 10 minutes).
    pub cycle_interval: Duration,
    /// Period between heartbeats (default: 60 seconds).
    pub heartbeat_interval: Duration,
    /// Deadline for each startup probe (default: 8 seconds).
    pub startup_probe_timeout: Duration,
    /// Default deadline for every outbound request (default: 30 seconds).
    pub http_default_timeout: Duration,
    /// Attempts per idempotent request, first try included (default: 3).
    pub http_retry_attempts: u32,
    /// Start the orchestrator inside the API process (default: `true`).
    pub autostart: bool,
    pub guard: GuardConfig,
}

impl WorkerConfig {
    /// Load configuration from the environment.
    ///
    /// | Env Var                    | Default  |
    /// |----------------------------|----------|
    /// | `CYCLE_INTERVAL_MS`        | `600000` |
    /// | `HEARTBEAT_INTERVAL_MS`    | `60000`  |
    /// | `STARTUP_PROBE_TIMEOUT_MS` | `8000`   |
    /// | `HTTP_DEFAULT_TIMEOUT_MS`  | `30000`  |
    /// | `HTTP_RETRY_ATTEMPTS`      | `3`      |
    /// | `WORKER_AUTOSTART`         | `true`   |
    /// | `FLOW_GUARD_MAX_FAILURES`  | `0` (off)|
    /// | `FLOW_GUARD_DISABLE_SECS`  | `600`    |
    pub fn from_env(env: &EnvReader) -> Result<Self, ConfigError> {
        Ok(Self {
            cycle_interval: positive_millis(env, "CYCLE_INTERVAL_MS", 600_000)?,
            heartbeat_interval: positive_millis(env, "HEARTBEAT_INTERVAL_MS", 60_000)?,
            startup_probe_timeout: positive_millis(env, "STARTUP_PROBE_TIMEOUT_MS", 8_000)?,
            http_default_timeout: positive_millis(
                env,
                "HTTP_DEFAULT_TIMEOUT_MS",
                DEFAULT_HTTP_TIMEOUT.as_millis() as u64,
            )?,
            http_retry_attempts: retry_attempts(env)?,
            autostart: env.flag_or("WORKER_AUTOSTART", true)?,
            guard: GuardConfig {
                max_failures: env.parse_or("FLOW_GUARD_MAX_FAILURES", 0)?,
                disable_for: Duration::from_secs(env.parse_or("FLOW_GUARD_DISABLE_SECS", 600)?),
            },
        })
    }
}

/// Timers panic on a zero period, so zero is rejected here.
fn positive_millis(env: &EnvReader, key: &str, default: u64) -> Result<Duration, ConfigError> {
    let millis: u64 = env.parse_or(key, default)?;
    if millis == 0 {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            value: "0".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_millis(millis))
}

fn retry_attempts(env: &EnvReader) -> Result<u32, ConfigError> {
    const KEY: &str = "HTTP_RETRY_ATTEMPTS";
    let attempts: u32 = env.parse_or(KEY, RetryPolicy::default().max_attempts)?;
    if attempts == 0 {
        return Err(ConfigError::Invalid {
            key: KEY.to_string(),
            value: "0".to_string(),
            reason: "must be at least 1 (1 disables retries)".to_string(),
        });
    }
    Ok(attempts)
}
