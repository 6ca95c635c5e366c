// Normalized bridge outcome shared by both transports.

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Value of the `proxy` field that asks the client to repeat a call on the
/// relay channel. Compared exactly; other values are ignored.
pub const RELAY_MARKER: &str = "officejs-client";

/// Error message for a direct call that produced no usable result.
pub const NO_RESULT: &str = "no_result";
/// Error message for a relay hop that failed.
pub const RELAY_FAILED: &str = "relay_failed";

/// Result fields that may carry the relay marker.
const RELAY_FIELDS: &[&str] = &["proxy", "relay"];

/// Which backend actually executed an operation.
///
/// Unrecognized mode strings survive as [`ExecutionMode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionMode {
    /// In-process control through an add-in runtime.
    OfficeJs,
    /// API-mediated control.
    Graph,
    #[default]
    Unknown,
    Other(String),
}

impl ExecutionMode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::OfficeJs => "OFFICEJS",
            Self::Graph => "GRAPH",
            Self::Unknown => "UNKNOWN",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for ExecutionMode {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "OFFICEJS" => Self::OfficeJs,
            "GRAPH" => Self::Graph,
            "UNKNOWN" => Self::Unknown,
            _ => Self::Other(raw),
        }
    }
}

impl From<ExecutionMode> for String {
    fn from(mode: ExecutionMode) -> Self {
        match mode {
            ExecutionMode::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instruction from the direct channel to repeat the call elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayHint {
    /// Run the operation inside the add-in client via the relay channel.
    OfficeJsClient,
}

impl RelayHint {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OfficeJsClient => RELAY_MARKER,
        }
    }

    /// Exact match only: a truthy but different value is not a hint.
    pub fn from_marker(value: &Value) -> Option<Self> {
        match value.as_str() {
            Some(RELAY_MARKER) => Some(Self::OfficeJsClient),
            _ => None,
        }
    }
}

/// Error reported with a failed result.
///
/// Servers send either an object (`{message, ...}`) or a bare value such as
/// a string; both decode, and a bare value is written back as it came.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct ErrorInfo {
    pub message: String,
    pub details: Option<Value>,
    pub extra: Map<String, Value>,
    bare: Option<Value>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), ..Self::default() }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self.bare = None;
        self
    }
}

impl From<Value> for ErrorInfo {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(mut fields) => {
                let message = match fields.remove("message") {
                    Some(Value::String(message)) => message,
                    Some(other) => {
                        fields.insert("message".into(), other);
                        String::new()
                    }
                    None => String::new(),
                };
                let details = fields.remove("details");
                Self { message, details, extra: fields, bare: None }
            }
            Value::String(message) => {
                Self { message: message.clone(), bare: Some(Value::String(message)), ..Self::default() }
            }
            other => Self { bare: Some(other), ..Self::default() },
        }
    }
}

impl From<ErrorInfo> for Value {
    fn from(error: ErrorInfo) -> Self {
        if let Some(bare) = error.bare {
            return bare;
        }
        let mut fields = error.extra;
        if !error.message.is_empty() {
            fields.insert("message".into(), Value::String(error.message));
        }
        if let Some(details) = error.details {
            fields.insert("details".into(), details);
        }
        Value::Object(fields)
    }
}

/// Outcome of one bridge operation.
///
/// Fields the client does not model are kept in `extra` so a server result
/// passes through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResult {
    pub ok: bool,
    #[serde(default, deserialize_with = "lenient_mode")]
    pub mode: ExecutionMode,
    /// `Some(Value::Null)` when the server sent an explicit `null`.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    /// End-to-end latency in milliseconds.
    #[serde(
        default,
        deserialize_with = "lenient_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub ms: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BridgeResult {
    pub fn success(mode: ExecutionMode, data: Value) -> Self {
        Self { ok: true, mode, data: Some(data), error: None, ms: None, extra: Map::new() }
    }

    pub fn failure(mode: ExecutionMode, error: ErrorInfo) -> Self {
        Self { ok: false, mode, data: None, error: Some(error), ms: None, extra: Map::new() }
    }

    /// Terminal outcome for a direct call that yielded no result.
    pub fn no_result() -> Self {
        Self::failure(ExecutionMode::Unknown, ErrorInfo::new(NO_RESULT))
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.ms = Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn relay_hint(&self) -> Option<RelayHint> {
        RELAY_FIELDS.iter().find_map(|field| self.extra.get(*field).and_then(RelayHint::from_marker))
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|error| error.message.as_str())
    }

    pub fn is_no_result(&self) -> bool {
        !self.ok && self.error_message() == Some(NO_RESULT)
    }

    pub fn is_relay_failed(&self) -> bool {
        !self.ok && self.error_message() == Some(RELAY_FAILED)
    }

    /// Decode `data` into a caller-chosen type. Absent data is `Ok(None)`.
    pub fn decode_data<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.data.clone().map(serde_json::from_value).transpose()
    }
}

// A mode that is not a string (`null`, a number) reads as `UNKNOWN`.
fn lenient_mode<'de, D>(deserializer: D) -> Result<ExecutionMode, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(raw) => ExecutionMode::from(raw),
        _ => ExecutionMode::Unknown,
    })
}

// Present-but-null stays `Some` so it is written back out.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// Servers report elapsed time as integers or floats; anything else is dropped
// rather than failing the whole result.
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| {
        value.as_u64().or_else(|| {
            value.as_f64().filter(|ms| ms.is_finite() && *ms >= 0.0).map(|ms| ms.round() as u64)
        })
    }))
}
