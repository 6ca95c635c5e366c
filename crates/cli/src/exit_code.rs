// Consistent exit codes for the sheetbridge CLI.
//
//   0  = success
//   1  = the spreadsheet reported an error
//   2  = usage/argument error
//   10 = no result from the RPC endpoint
//   13 = relay channel failed

use std::fmt;
use std::process;

use sheetbridge_common::protocol::bridge::BridgeResult;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    NoResult = 10,
    RelayFailed = 13,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map a finished bridge call to an exit code.
    pub fn from_result(result: &BridgeResult) -> Self {
        if result.ok {
            Self::Success
        } else if result.is_no_result() {
            Self::NoResult
        } else if result.is_relay_failed() {
            Self::RelayFailed
        } else {
            Self::Error
        }
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        if err.chain().any(|cause| cause.downcast_ref::<UsageError>().is_some()) {
            return Self::Usage;
        }
        Self::Error
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}

/// Bad command-line input that clap itself cannot catch, such as a
/// malformed JSON argument.
#[derive(Debug)]
pub struct UsageError {
    pub argument: &'static str,
    pub message: String,
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.argument, self.message)
    }
}

impl std::error::Error for UsageError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sheetbridge_common::protocol::bridge::{ErrorInfo, ExecutionMode, RELAY_FAILED};

    #[test]
    fn exit_code_values() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::Error.code(), 1);
        assert_eq!(ExitCode::Usage.code(), 2);
        assert_eq!(ExitCode::NoResult.code(), 10);
        assert_eq!(ExitCode::RelayFailed.code(), 13);
    }

    #[test]
    fn from_result_maps_each_outcome() {
        assert_eq!(
            ExitCode::from_result(&BridgeResult::success(ExecutionMode::Graph, json!(null))),
            ExitCode::Success
        );
        assert_eq!(ExitCode::from_result(&BridgeResult::no_result()), ExitCode::NoResult);
        assert_eq!(
            ExitCode::from_result(&BridgeResult::failure(
                ExecutionMode::OfficeJs,
                ErrorInfo::new(RELAY_FAILED)
            )),
            ExitCode::RelayFailed
        );
        assert_eq!(
            ExitCode::from_result(&BridgeResult::failure(ExecutionMode::Graph, ErrorInfo::new("bad_range"))),
            ExitCode::Error
        );
    }

    #[test]
    fn from_error_usage_in_chain() {
        let err = anyhow::Error::new(UsageError { argument: "values", message: "expected JSON".into() })
            .context("set command failed");
        assert_eq!(ExitCode::from_error(&err), ExitCode::Usage);
    }

    #[test]
    fn from_error_generic_is_error() {
        let err = anyhow::anyhow!("something went wrong");
        assert_eq!(ExitCode::from_error(&err), ExitCode::Error);
    }

    #[test]
    fn exit_code_to_process_exit_code() {
        let code: process::ExitCode = ExitCode::RelayFailed.into();
        let _ = code;
    }
}
