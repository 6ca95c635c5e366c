// `sheetbridge set`: write values into a range.

use clap::Args;
use sheetbridge_common::types::{Operation, RangeValues};

use super::{parse_json_arg, SessionArgs};
use crate::exit_code::{ExitCode, UsageError};

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Range address (e.g. `Sheet1!A1:B2`).
    pub address: String,

    /// Values as JSON, normally a matrix such as `[[1,"a"],[2,"b"]]`.
    pub values: String,

    #[command(flatten)]
    pub session: SessionArgs,
}

impl SetArgs {
    fn operation(&self) -> Result<Operation, UsageError> {
        let values: RangeValues = parse_json_arg("values", &self.values, "a JSON value")?;
        Ok(Operation::set_range(self.address.clone(), values))
    }
}

pub fn run(args: SetArgs) -> anyhow::Result<ExitCode> {
    let operation = args.operation()?;
    super::execute(operation, &args.session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sheetbridge_common::types::SessionLocator;

    fn args(values: &str) -> SetArgs {
        SetArgs { address: "Sheet1!A1".into(), values: values.into(), session: SessionArgs::default() }
    }

    #[test]
    fn matrix_values_are_sent_as_is() {
        let operation = args(r#"[[1,"a"],[2,null]]"#).operation().unwrap();
        assert_eq!(
            operation.params(&SessionLocator::ambient()),
            json!({ "address": "Sheet1!A1", "values": [[1, "a"], [2, null]] })
        );
    }

    #[test]
    fn malformed_values_are_a_usage_error() {
        let err = args("[[1,").operation().unwrap_err();
        assert_eq!(err.argument, "values");
    }
}
