// HTTP transports for the bridge client.
//
// The direct channel posts a JSON-RPC envelope to the automation server.
// The relay channel posts the bare params object to a same-origin path that
// names the operation. Both are traits so the bridge can be exercised
// against recording fakes.

use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use sheetbridge_common::protocol::jsonrpc::{Request, Response};
use sheetbridge_common::protocol::rpc_methods::OperationKind;
use url::Url;

pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Primary channel: JSON-RPC to the automation server.
pub trait DirectTransport: Send + Sync {
    fn call<'a>(&'a self, request: &'a Request) -> TransportFuture<'a, Response>;
}

/// Secondary channel: replays an operation's params where it can execute.
pub trait RelayTransport: Send + Sync {
    fn relay<'a>(&'a self, kind: OperationKind, params: &'a Value) -> TransportFuture<'a, Value>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to `{url}` failed")]
    Unreachable {
        url: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("`{url}` returned HTTP {status}")]
    Status { url: String, status: u16, body: String },

    #[error("`{url}` returned a body that is not valid JSON")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to build http client")]
    ClientBuild(#[source] reqwest::Error),
}

impl TransportError {
    pub fn unreachable(url: impl Into<String>, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Unreachable { url: url.into(), source: source.into() }
    }

    /// Diagnostic payload attached to a failed bridge result.
    pub fn details(&self) -> Value {
        match self {
            Self::Status { status, body, .. } => {
                let body = serde_json::from_str::<Value>(body)
                    .unwrap_or_else(|_| Value::String(body.clone()));
                json!({ "status": status, "body": body })
            }
            other => json!({ "reason": error_chain(other) }),
        }
    }
}

fn error_chain(error: &dyn StdError) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

/// Build the shared reqwest client. The timeout, if any, is the only
/// deadline a bridge call is subject to.
pub fn build_http_client(timeout: Option<Duration>) -> Result<Client, TransportError> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(TransportError::ClientBuild)
}

#[derive(Debug, Clone)]
pub struct HttpDirectTransport {
    client: Client,
    endpoint: Url,
}

impl HttpDirectTransport {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post(&self, request: &Request) -> Result<Response, TransportError> {
        let url = self.endpoint.as_str();
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|error| TransportError::unreachable(url, error))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|error| TransportError::unreachable(url, error))?;

        // JSON-RPC servers may report errors with a non-2xx status but a
        // valid envelope; prefer the envelope when there is one.
        match serde_json::from_slice::<Response>(&body) {
            Ok(envelope) => Ok(envelope),
            Err(_) if !status.is_success() => Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
            Err(source) => Err(TransportError::Decode { url: url.to_string(), source }),
        }
    }
}

impl DirectTransport for HttpDirectTransport {
    fn call<'a>(&'a self, request: &'a Request) -> TransportFuture<'a, Response> {
        Box::pin(self.post(request))
    }
}

#[derive(Debug, Clone)]
pub struct HttpRelayTransport {
    client: Client,
    app_origin: Url,
}

impl HttpRelayTransport {
    pub fn new(client: Client, app_origin: Url) -> Self {
        Self { client, app_origin }
    }

    pub fn endpoint_for(&self, kind: OperationKind) -> Result<Url, TransportError> {
        Ok(self.app_origin.join(&kind.relay_path())?)
    }

    async fn post(&self, kind: OperationKind, params: &Value) -> Result<Value, TransportError> {
        let endpoint = self.endpoint_for(kind)?;
        let url = endpoint.to_string();
        let response = self
            .client
            .post(endpoint)
            .json(params)
            .send()
            .await
            .map_err(|error| TransportError::unreachable(url.as_str(), error))?;

        let status = response.status();
        let body =
            response.bytes().await.map_err(|error| TransportError::unreachable(url.as_str(), error))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body).map_err(|source| TransportError::Decode { url, source })
    }
}

impl RelayTransport for HttpRelayTransport {
    fn relay<'a>(&'a self, kind: OperationKind, params: &'a Value) -> TransportFuture<'a, Value> {
        Box::pin(self.post(kind, params))
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use reqwest::Client;
    use serde_json::json;
    use sheetbridge_common::protocol::rpc_methods::OperationKind;
    use url::Url;

    use super::{HttpRelayTransport, TransportError};

    #[test]
    fn relay_endpoint_replaces_origin_path() {
        let transport = HttpRelayTransport::new(
            Client::new(),
            Url::parse("http://127.0.0.1:8080/dashboard/").expect("origin should parse"),
        );
        let url = transport.endpoint_for(OperationKind::AppendRow).expect("endpoint should build");
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/api/excel/relay/append-row");
    }

    #[test]
    fn status_details_embed_json_body() {
        let error = TransportError::Status {
            url: "http://x/api".into(),
            status: 502,
            body: r#"{"error":{"code":"RELAY_TIMEOUT"}}"#.into(),
        };
        assert_eq!(
            error.details(),
            json!({ "status": 502, "body": { "error": { "code": "RELAY_TIMEOUT" } } })
        );
    }

    #[test]
    fn status_details_keep_plain_text_body() {
        let error =
            TransportError::Status { url: "http://x/api".into(), status: 500, body: "boom".into() };
        assert_eq!(error.details(), json!({ "status": 500, "body": "boom" }));
    }

    #[test]
    fn unreachable_details_include_cause() {
        let error = TransportError::unreachable(
            "http://127.0.0.1:1/jsonrpc",
            io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        );
        let reason = error.details()["reason"].as_str().expect("reason should be text").to_owned();
        assert!(reason.contains("http://127.0.0.1:1/jsonrpc"));
        assert!(reason.contains("connection refused"));
    }
}
