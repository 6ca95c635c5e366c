// Operation payloads and session routing metadata.
//
// Payloads are built per call, turned into a JSON params object, and then
// dropped. Nothing here is persisted.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::protocol::rpc_methods::OperationKind;

/// Selects which open spreadsheet session a call targets.
///
/// Both fields empty means the server's ambient session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct SessionLocator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workbook_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl SessionLocator {
    /// Blank identifiers are treated as absent.
    pub fn new(workbook_id: Option<String>, session_id: Option<String>) -> Self {
        Self { workbook_id: non_blank(workbook_id), session_id: non_blank(session_id) }
    }

    pub fn ambient() -> Self {
        Self::default()
    }

    pub fn is_ambient(&self) -> bool {
        self.workbook_id.is_none() && self.session_id.is_none()
    }

    /// True when every field this locator pins equals the corresponding
    /// field of `session`. An ambient locator routes to any session.
    pub fn routes_to(&self, session: &SessionLocator) -> bool {
        pinned_field_matches(self.workbook_id.as_deref(), session.workbook_id.as_deref())
            && pinned_field_matches(self.session_id.as_deref(), session.session_id.as_deref())
    }

    /// Read the locator fields out of an operation params object.
    pub fn from_params(params: &Value) -> Self {
        let field = |name: &str| params.get(name).and_then(Value::as_str).map(ToOwned::to_owned);
        Self::new(field("workbookId"), field("sessionId"))
    }

    fn write_into(&self, params: &mut Map<String, Value>) {
        if let Some(workbook_id) = &self.workbook_id {
            params.insert("workbookId".into(), Value::String(workbook_id.clone()));
        }
        if let Some(session_id) = &self.session_id {
            params.insert("sessionId".into(), Value::String(session_id.clone()));
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn pinned_field_matches(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => actual == Some(wanted),
    }
}

/// Values written to a range: a 2-D matrix, or a single scalar applied to
/// the whole range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RangeValues {
    Matrix(Vec<Vec<Value>>),
    Scalar(Value),
}

impl From<Vec<Vec<Value>>> for RangeValues {
    fn from(matrix: Vec<Vec<Value>>) -> Self {
        Self::Matrix(matrix)
    }
}

/// Read (no values) or write (with values) against an A1-style address
/// such as `Sheet1!A1:B2`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RangeOperation {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<RangeValues>,
}

/// Append one row to a named table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppendOperation {
    pub table_name: String,
    pub values: Vec<Value>,
}

/// One high-level bridge operation with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    GetRange(RangeOperation),
    SetRange(RangeOperation),
    AppendRow(AppendOperation),
}

impl Operation {
    pub fn get_range(address: impl Into<String>) -> Self {
        Self::GetRange(RangeOperation { address: address.into(), values: None })
    }

    pub fn set_range(address: impl Into<String>, values: RangeValues) -> Self {
        Self::SetRange(RangeOperation { address: address.into(), values: Some(values) })
    }

    pub fn append_row(table_name: impl Into<String>, values: Vec<Value>) -> Self {
        Self::AppendRow(AppendOperation { table_name: table_name.into(), values })
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::GetRange(_) => OperationKind::GetRange,
            Self::SetRange(_) => OperationKind::SetRange,
            Self::AppendRow(_) => OperationKind::AppendRow,
        }
    }

    /// The params object sent on both transports: payload fields merged
    /// with the locator. Absent locator fields are omitted.
    pub fn params(&self, locator: &SessionLocator) -> Value {
        let mut params = Map::new();
        match self {
            Self::GetRange(op) => {
                params.insert("address".into(), Value::String(op.address.clone()));
            }
            Self::SetRange(op) => {
                params.insert("address".into(), Value::String(op.address.clone()));
                let values = match &op.values {
                    Some(RangeValues::Matrix(matrix)) => json!(matrix),
                    Some(RangeValues::Scalar(scalar)) => scalar.clone(),
                    None => Value::Null,
                };
                params.insert("values".into(), values);
            }
            Self::AppendRow(op) => {
                params.insert("tableName".into(), Value::String(op.table_name.clone()));
                params.insert("values".into(), Value::Array(op.values.clone()));
            }
        }
        locator.write_into(&mut params);
        Value::Object(params)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Operation, RangeValues, SessionLocator};

    fn session(workbook: Option<&str>, session: Option<&str>) -> SessionLocator {
        SessionLocator::new(workbook.map(String::from), session.map(String::from))
    }

    #[test]
    fn blank_locator_fields_are_dropped() {
        let locator = session(Some("  "), Some(""));
        assert!(locator.is_ambient());
    }

    #[test]
    fn ambient_locator_routes_anywhere() {
        assert!(SessionLocator::ambient().routes_to(&session(Some("wb-1"), Some("s-1"))));
        assert!(SessionLocator::ambient().routes_to(&SessionLocator::ambient()));
    }

    #[test]
    fn pinned_session_only_routes_to_that_session() {
        let wanted = session(None, Some("s-1"));
        assert!(wanted.routes_to(&session(Some("wb-9"), Some("s-1"))));
        assert!(!wanted.routes_to(&session(Some("wb-9"), Some("s-2"))));
        assert!(!wanted.routes_to(&SessionLocator::ambient()));
    }

    #[test]
    fn both_fields_must_match_when_both_pinned() {
        let wanted = session(Some("wb-1"), Some("s-1"));
        assert!(wanted.routes_to(&session(Some("wb-1"), Some("s-1"))));
        assert!(!wanted.routes_to(&session(Some("wb-2"), Some("s-1"))));
    }

    #[test]
    fn get_range_params_omit_absent_locator() {
        let params = Operation::get_range("Sheet1!A1:B2").params(&SessionLocator::ambient());
        assert_eq!(params, json!({ "address": "Sheet1!A1:B2" }));
    }

    #[test]
    fn set_range_params_merge_locator() {
        let op = Operation::set_range("Sheet1!A1", RangeValues::Matrix(vec![vec![json!(5)]]));
        let params = op.params(&session(Some("wb-1"), Some("s-1")));
        assert_eq!(
            params,
            json!({
                "address": "Sheet1!A1",
                "values": [[5]],
                "workbookId": "wb-1",
                "sessionId": "s-1"
            })
        );
    }

    #[test]
    fn append_row_params_use_table_name() {
        let op = Operation::append_row("Payments", vec![json!("2024-01-01"), json!(120.5)]);
        let params = op.params(&session(None, Some("s-7")));
        assert_eq!(
            params,
            json!({ "tableName": "Payments", "values": ["2024-01-01", 120.5], "sessionId": "s-7" })
        );
    }

    #[test]
    fn range_values_decode_matrix_before_scalar() {
        let matrix: RangeValues = serde_json::from_value(json!([[1, 2], [3, 4]]))
            .expect("matrix should decode");
        assert!(matches!(matrix, RangeValues::Matrix(ref rows) if rows.len() == 2));

        let scalar: RangeValues = serde_json::from_value(json!("x")).expect("scalar should decode");
        assert_eq!(scalar, RangeValues::Scalar(json!("x")));
    }

    #[test]
    fn locator_can_be_read_back_from_params() {
        let params = json!({ "address": "A1", "sessionId": "s-3" });
        assert_eq!(SessionLocator::from_params(&params), session(None, Some("s-3")));
    }
}
