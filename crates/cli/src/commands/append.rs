// `sheetbridge append`: add one row to a table.

use clap::Args;
use serde_json::Value;
use sheetbridge_common::types::Operation;

use super::{parse_json_arg, SessionArgs};
use crate::exit_code::{ExitCode, UsageError};

#[derive(Debug, Args)]
pub struct AppendArgs {
    /// Table name.
    pub table: String,

    /// Row as a JSON array, e.g. `["2024-01-01", 42]`.
    pub row: String,

    #[command(flatten)]
    pub session: SessionArgs,
}

impl AppendArgs {
    fn operation(&self) -> Result<Operation, UsageError> {
        let row: Vec<Value> = parse_json_arg("row", &self.row, "a JSON array")?;
        Ok(Operation::append_row(self.table.clone(), row))
    }
}

pub fn run(args: AppendArgs) -> anyhow::Result<ExitCode> {
    let operation = args.operation()?;
    super::execute(operation, &args.session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sheetbridge_common::types::SessionLocator;

    #[test]
    fn row_and_locator_become_params() {
        let args = AppendArgs {
            table: "Orders".into(),
            row: r#"["2024-01-01", 42]"#.into(),
            session: SessionArgs { session_id: Some("s-1".into()), ..SessionArgs::default() },
        };
        let operation = args.operation().unwrap();
        assert_eq!(
            operation.params(&args.session.locator()),
            json!({ "tableName": "Orders", "values": ["2024-01-01", 42], "sessionId": "s-1" })
        );
        assert_eq!(operation.params(&SessionLocator::ambient())["tableName"], "Orders");
    }

    #[test]
    fn non_array_row_is_a_usage_error() {
        let args = AppendArgs { table: "Orders".into(), row: "{\"a\":1}".into(), session: SessionArgs::default() };
        let err = args.operation().unwrap_err();
        assert_eq!(err.argument, "row");
    }
}
