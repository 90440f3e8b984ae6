use serde::Serialize;

/// Machine-readable classification of an ops failure.
///
/// Serialized as `snake_case` so HTTP consumers can branch on it without
/// parsing the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Required credentials are absent; no network call was made.
    MissingConfig,
    /// A configuration value is present but unusable.
    InvalidConfig,
    /// An optional destination (webhook, feed, engine) is not configured.
    NotConfigured,
    /// Network, DNS or TLS failure.
    Transport,
    /// The call exceeded its deadline and was cancelled.
    Timeout,
    /// The remote answered with a non-2xx status.
    HttpStatus,
    /// The remote answered but the body could not be interpreted.
    Parse,
    /// A lookup (e.g. workflow by name) had no match.
    NotFound,
    /// The flow guard has temporarily suspended this flow.
    Suspended,
    /// The task running the operation panicked.
    Panicked,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MissingConfig => "missing_config",
            FailureKind::InvalidConfig => "invalid_config",
            FailureKind::NotConfigured => "not_configured",
            FailureKind::Transport => "transport",
            FailureKind::Timeout => "timeout",
            FailureKind::HttpStatus => "http_status",
            FailureKind::Parse => "parse",
            FailureKind::NotFound => "not_found",
            FailureKind::Suspended => "suspended",
            FailureKind::Panicked => "panicked",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum number of characters of a remote body kept in an error message.
const BODY_SNIPPET_CHARS: usize = 200;

/// Failure payload shared by probes and flow triggers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct OpsFailure {
    pub kind: FailureKind,
    pub message: String,
    /// HTTP status, when the failure came from a remote response.
    pub status: Option<u16>,
    /// Names of absent configuration variables (only for `MissingConfig`).
    pub missing_config: Vec<String>,
}

impl OpsFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            missing_config: Vec::new(),
        }
    }

    /// Failure listing exactly the configuration names that are absent.
    pub fn missing_config(names: Vec<String>) -> Self {
        Self {
            kind: FailureKind::MissingConfig,
            message: format!("missing config: {}", names.join(", ")),
            status: None,
            missing_config: names,
        }
    }

    /// Failure for a non-2xx response, keeping a short snippet of the body.
    pub fn http_status(status: u16, body: &str) -> Self {
        let snippet = crate::text::truncate_chars(body.trim(), BODY_SNIPPET_CHARS);
        let message = if snippet.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {snippet}")
        };
        Self::new(FailureKind::HttpStatus, message).with_status(status)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Error raised while reading typed configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_lists_names_in_message() {
        let failure = OpsFailure::missing_config(vec!["A".into(), "B".into()]);
        assert_eq!(failure.kind, FailureKind::MissingConfig);
        assert_eq!(failure.to_string(), "missing config: A, B");
        assert_eq!(failure.missing_config, vec!["A", "B"]);
    }

    #[test]
    fn http_status_without_body() {
        let failure = OpsFailure::http_status(503, "   ");
        assert_eq!(failure.message, "HTTP 503");
        assert_eq!(failure.status, Some(503));
    }

    #[test]
    fn http_status_truncates_long_body() {
        let body = "x".repeat(1000);
        let failure = OpsFailure::http_status(500, &body);
        assert!(failure.message.len() < 300);
        assert!(failure.message.starts_with("HTTP 500: xxx"));
    }

    #[test]
    fn failure_kind_serializes_snake_case() {
        let json = serde_json::to_value(FailureKind::HttpStatus).unwrap();
        assert_eq!(json, "http_status");
        assert_eq!(FailureKind::MissingConfig.to_string(), "missing_config");
    }
}
