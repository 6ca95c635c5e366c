// RPC method names and relay paths for the three bridge operations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Direct RPC channel ─────────────────────────────────────────────
pub const EXCEL_GET_RANGE: &str = "excel.get_range";
pub const EXCEL_SET_RANGE: &str = "excel.set_range";
pub const EXCEL_APPEND_ROW: &str = "excel.append_row";

// ── Relay channel ──────────────────────────────────────────────────
/// Same-origin prefix the relay host mounts operation endpoints under.
pub const RELAY_PATH_PREFIX: &str = "/api/excel/relay";
/// Endpoints add-in runtimes poll for relayed work.
pub const AGENT_JOBS_PATH: &str = "/api/excel/agent/jobs";

/// All methods the bridge client issues.
pub const BRIDGE_METHODS: &[&str] = &[EXCEL_GET_RANGE, EXCEL_SET_RANGE, EXCEL_APPEND_ROW];

/// The logical operation a bridge call performs, independent of transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    GetRange,
    SetRange,
    AppendRow,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown bridge operation `{0}`")]
pub struct UnknownOperation(pub String);

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [Self::GetRange, Self::SetRange, Self::AppendRow];

    pub const fn rpc_method(self) -> &'static str {
        match self {
            Self::GetRange => EXCEL_GET_RANGE,
            Self::SetRange => EXCEL_SET_RANGE,
            Self::AppendRow => EXCEL_APPEND_ROW,
        }
    }

    /// Path segment identifying this operation on the relay channel.
    pub const fn relay_segment(self) -> &'static str {
        match self {
            Self::GetRange => "get-range",
            Self::SetRange => "set-range",
            Self::AppendRow => "append-row",
        }
    }

    /// Absolute path (relative to the app origin) of the relay endpoint.
    pub fn relay_path(self) -> String {
        format!("{RELAY_PATH_PREFIX}/{}", self.relay_segment())
    }
}

impl FromStr for OperationKind {
    type Err = UnknownOperation;

    fn from_str(segment: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.relay_segment() == segment)
            .ok_or_else(|| UnknownOperation(segment.to_string()))
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.relay_segment())
    }
}

#[cfg(test)]
mod tests {
    use super::{OperationKind, UnknownOperation};

    #[test]
    fn relay_segments_round_trip_through_from_str() {
        for kind in OperationKind::ALL {
            assert_eq!(kind.relay_segment().parse::<OperationKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_segment_is_rejected() {
        assert_eq!(
            "delete-sheet".parse::<OperationKind>(),
            Err(UnknownOperation("delete-sheet".to_string()))
        );
    }

    #[test]
    fn relay_path_is_under_prefix() {
        assert_eq!(OperationKind::SetRange.relay_path(), "/api/excel/relay/set-range");
    }

    #[test]
    fn serde_uses_relay_segment_spelling() {
        let encoded = serde_json::to_value(OperationKind::AppendRow).expect("kind should serialize");
        assert_eq!(encoded, serde_json::json!("append-row"));
    }
}
