// Bridge client configuration.
//
// The direct RPC endpoint comes from the environment; the relay channel is
// always reached at a fixed path under the hosting application's origin.

use std::time::Duration;

use url::Url;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8787/jsonrpc";
pub const DEFAULT_APP_ORIGIN: &str = "http://127.0.0.1:8080";

/// Settings for the direct and relay HTTP transports.
///
/// Constructed via [`BridgeConfig::from_env`] which reads environment
/// variables and falls back to local development defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// JSON-RPC endpoint of the local automation server.
    pub rpc_url: Url,
    /// Origin of the application hosting the relay endpoints.
    pub app_origin: Url,
    /// Per-request HTTP timeout. `None` leaves timing to the OS and server.
    pub http_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_url(DEFAULT_RPC_URL),
            app_origin: default_url(DEFAULT_APP_ORIGIN),
            http_timeout: None,
        }
    }
}

impl BridgeConfig {
    /// Parse configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `SHEETBRIDGE_RPC_URL` | `http://127.0.0.1:8787/jsonrpc` |
    /// | `SHEETBRIDGE_APP_ORIGIN` | `http://127.0.0.1:8080` |
    /// | `SHEETBRIDGE_HTTP_TIMEOUT_MS` | *(none)* |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    /// Testable constructor that accepts an environment lookup function.
    pub fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let rpc_url = env("SHEETBRIDGE_RPC_URL")
            .ok()
            .and_then(|raw| parse_http_url(&raw))
            .unwrap_or_else(|| default_url(DEFAULT_RPC_URL));

        let app_origin = env("SHEETBRIDGE_APP_ORIGIN")
            .ok()
            .and_then(|raw| parse_http_url(&raw))
            .unwrap_or_else(|| default_url(DEFAULT_APP_ORIGIN));

        let http_timeout = env("SHEETBRIDGE_HTTP_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        Self { rpc_url, app_origin, http_timeout }
    }

    pub fn with_rpc_url(mut self, rpc_url: Url) -> Self {
        self.rpc_url = rpc_url;
        self
    }

    pub fn with_app_origin(mut self, app_origin: Url) -> Self {
        self.app_origin = app_origin;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }
}

fn parse_http_url(raw: &str) -> Option<Url> {
    Url::parse(raw.trim()).ok().filter(|url| matches!(url.scheme(), "http" | "https"))
}

fn default_url(raw: &str) -> Url {
    Url::parse(raw).expect("built-in default url should parse")
}
