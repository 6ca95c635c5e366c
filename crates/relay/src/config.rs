// Relay host configuration.
//
// Centralizes environment variable parsing with defaults for local
// development.

use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_POLL_WAIT: Duration = Duration::from_secs(25);

/// Core relay host configuration.
///
/// Constructed via [`RelayConfig::from_env`] which reads environment
/// variables and falls back to sensible development defaults.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Listen address (host:port).
    pub listen_addr: SocketAddr,
    /// How long a relayed operation waits for an add-in to report back.
    pub job_timeout: Duration,
    /// Upper bound on an add-in's long-poll wait.
    pub max_poll_wait: Duration,
    /// Log filter directive (e.g. `info`, `sheetbridge_relay=debug`).
    pub log_filter: String,
    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::from_env_fn(|_| Err(std::env::VarError::NotPresent))
    }
}

impl RelayConfig {
    /// Parse configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `SHEETBRIDGE_RELAY_HOST` | `0.0.0.0` |
    /// | `SHEETBRIDGE_RELAY_PORT` | `8080` |
    /// | `SHEETBRIDGE_RELAY_JOB_TIMEOUT_MS` | `30000` |
    /// | `SHEETBRIDGE_RELAY_MAX_POLL_MS` | `25000` |
    /// | `SHEETBRIDGE_RELAY_LOG_FILTER` | `info` |
    /// | `SHEETBRIDGE_RELAY_LOG_FORMAT` | `text` (`json` for JSON lines) |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    /// Testable constructor that accepts an environment lookup function.
    fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let host = env("SHEETBRIDGE_RELAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env("SHEETBRIDGE_RELAY_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let listen_addr = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));

        let job_timeout = millis_from_env(&env, "SHEETBRIDGE_RELAY_JOB_TIMEOUT_MS")
            .unwrap_or(DEFAULT_JOB_TIMEOUT);
        let max_poll_wait =
            millis_from_env(&env, "SHEETBRIDGE_RELAY_MAX_POLL_MS").unwrap_or(DEFAULT_MAX_POLL_WAIT);

        let log_filter = env("SHEETBRIDGE_RELAY_LOG_FILTER").unwrap_or_else(|_| "info".into());
        let log_json = env("SHEETBRIDGE_RELAY_LOG_FORMAT")
            .map(|v| v.trim().eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Self { listen_addr, job_timeout, max_poll_wait, log_filter, log_json }
    }

    /// Clamp an add-in's requested long-poll wait to the configured bound.
    pub fn poll_wait(&self, requested_ms: Option<u64>) -> Duration {
        requested_ms
            .map(Duration::from_millis)
            .unwrap_or(self.max_poll_wait)
            .min(self.max_poll_wait)
    }
}

fn millis_from_env<F>(env: &F, key: &str) -> Option<Duration>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    env(key).ok().and_then(|v| v.parse::<u64>().ok()).filter(|ms| *ms > 0).map(Duration::from_millis)
}
