//! Environment-style configuration lookup.
//!
//! [`EnvReader`] wraps a key lookup function so configuration structs can be
//! built from the real process environment in production and from a plain
//! map in tests. Blank values are treated as absent, and legacy variable
//! names listed in [`ENV_ALIASES`] are consulted when the canonical name is
//! not set.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::ConfigError;

/// Canonical variable name followed by the legacy names that may supply it.
pub const ENV_ALIASES: &[(&str, &[&str])] = &[
    ("DISCORD_WEBHOOK_OPS", &["DISCORD_OPS_WEBHOOK_URL"]),
    ("DISCORD_WEBHOOK_ERRORS", &["DISCORD_ERRORS_WEBHOOK_URL"]),
    ("AIRTABLE_TABLE_KPI_LOG", &["AT_TABLE_KPI"]),
    ("WORKFLOW_ENGINE_URL", &["N8N_BASE_URL"]),
    ("WORKFLOW_ENGINE_API_KEY", &["N8N_API_KEY"]),
];

type Lookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Typed reader over an environment-like key/value source.
pub struct EnvReader {
    lookup: Box<Lookup>,
}

impl std::fmt::Debug for EnvReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvReader").finish_non_exhaustive()
    }
}

impl EnvReader {
    pub fn new<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
        }
    }

    /// Read from the process environment.
    pub fn from_process() -> Self {
        Self::new(|key| std::env::var(key).ok())
    }

    /// Read from a fixed set of pairs (tests, embedded defaults).
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(move |key| map.get(key).cloned())
    }

    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Value of `key`, falling back to its legacy aliases.
    pub fn var(&self, key: &str) -> Option<String> {
        if let Some(value) = self.raw(key) {
            return Some(value);
        }
        ENV_ALIASES
            .iter()
            .find(|(canonical, _)| *canonical == key)
            .and_then(|(_, aliases)| aliases.iter().find_map(|alias| self.raw(alias)))
    }

    pub fn var_or(&self, key: &str, default: &str) -> String {
        self.var(key).unwrap_or_else(|| default.to_string())
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.var(key).is_some()
    }

    /// Names from `keys` that have no value.
    pub fn missing(&self, keys: &[&str]) -> Vec<String> {
        keys.iter()
            .filter(|key| !self.is_set(key))
            .map(|key| key.to_string())
            .collect()
    }

    /// Parse `key` into `T`, using `default` when it is absent.
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.var(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                key: key.to_string(),
                value,
                reason: e.to_string(),
            }),
        }
    }

    /// Parse a boolean toggle. Accepts `true/false`, `1/0`, `yes/no`, `on/off`.
    pub fn flag_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        let Some(value) = self.var(key) else {
            return Ok(default);
        };
        match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key: key.to_string(),
                value,
                reason: "expected a boolean".to_string(),
            }),
        }
    }
}
