// CLI subcommand dispatch.

use anyhow::Context;
use clap::{Args, Subcommand};
use serde::de::DeserializeOwned;
use sheetbridge_client::{BridgeClient, BridgeConfig};
use sheetbridge_common::types::{Operation, SessionLocator};
use tracing::debug;

use crate::exit_code::{ExitCode, UsageError};
use crate::output::{self, OutputFormat};

pub mod append;
pub mod get;
pub mod set;

#[derive(Subcommand)]
pub enum Command {
    /// Read the values of a range
    Get(get::GetArgs),
    /// Write a matrix of values into a range
    Set(set::SetArgs),
    /// Append one row to a table
    Append(append::AppendArgs),
}

/// Which live session to target, plus output selection.
#[derive(Debug, Clone, Default, Args)]
pub struct SessionArgs {
    /// Workbook to target.
    #[arg(long)]
    pub workbook_id: Option<String>,

    /// Add-in session to target.
    #[arg(long)]
    pub session_id: Option<String>,

    /// Force JSON output.
    #[arg(long)]
    pub json: bool,
}

impl SessionArgs {
    pub fn locator(&self) -> SessionLocator {
        SessionLocator::new(self.workbook_id.clone(), self.session_id.clone())
    }
}

impl Command {
    /// Whether `--json` was passed, for reporting errors the command itself
    /// could not print.
    pub fn json(&self) -> bool {
        match self {
            Self::Get(args) => args.session.json,
            Self::Set(args) => args.session.json,
            Self::Append(args) => args.session.json,
        }
    }
}

pub fn run(cmd: Command) -> anyhow::Result<ExitCode> {
    match cmd {
        Command::Get(args) => get::run(args),
        Command::Set(args) => set::run(args),
        Command::Append(args) => append::run(args),
    }
}

/// Send one operation through the bridge and report the outcome.
pub(crate) fn execute(operation: Operation, session: &SessionArgs) -> anyhow::Result<ExitCode> {
    let format = OutputFormat::detect(session.json);
    let locator = session.locator();
    let client = BridgeClient::from_config(&BridgeConfig::from_env())
        .context("failed to build bridge client")?;

    debug!(
        operation = %operation.kind(),
        workbook_id = locator.workbook_id.as_deref(),
        session_id = locator.session_id.as_deref(),
        "running bridge operation"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    let result = runtime.block_on(client.execute(&operation, &locator));

    let code = ExitCode::from_result(&result);
    debug!(ok = result.ok, mode = %result.mode, exit_code = code.code(), "bridge operation finished");
    output::print_result(format, &result)?;
    Ok(code)
}

/// Parse a JSON command-line argument, reporting failures as usage errors.
pub(crate) fn parse_json_arg<T: DeserializeOwned>(
    argument: &'static str,
    raw: &str,
    expected: &str,
) -> Result<T, UsageError> {
    serde_json::from_str(raw).map_err(|error| UsageError {
        argument,
        message: format!("expected {expected}: {error}"),
    })
}
