use std::net::{IpAddr, SocketAddr};

use krizzy_core::{ConfigError, EnvReader};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: IpAddr,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    /// Empty means no cross-origin access.
    pub cors_origins: Vec<String>,
    /// Deadline in seconds for routes that make no outbound calls
    /// (default: `30`). `/ops` routes are bounded by the HTTP client's
    /// per-request timeouts instead.
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default   |
    /// |------------------------|-----------|
    /// | `HOST`                 | `0.0.0.0` |
    /// | `PORT`                 | `3000`    |
    /// | `CORS_ORIGINS`         | (empty)   |
    /// | `REQUEST_TIMEOUT_SECS` | `30`      |
    pub fn from_env(env: &EnvReader) -> Result<Self, ConfigError> {
        let host = env.parse_or("HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port = env.parse_or("PORT", 3000u16)?;

        let cors_origins: Vec<String> = env
            .var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = env.parse_or("REQUEST_TIMEOUT_SECS", 30u64)?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
