// Output format auto-detection for the CLI.
//
// TTY → human-readable text. Piped/redirected → structured JSON.
// `--json` flag forces JSON output regardless of terminal.

use serde::Serialize;
use serde_json::Value;
use sheetbridge_client::TransportError;
use sheetbridge_common::protocol::bridge::{BridgeResult, NO_RESULT, RELAY_FAILED};
use std::io::{self, IsTerminal, Write};

use crate::exit_code::UsageError;

const ANSI_RED: &str = "\x1b[31m";
const ANSI_RESET: &str = "\x1b[0m";

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Human,
    /// Machine-readable JSON (one object per response).
    Json,
}

impl OutputFormat {
    /// Auto-detect format: JSON if `--json` was passed or stdout is not a TTY.
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        Self::detect_from_terminal(io::stdout().is_terminal())
    }

    /// Testable variant that takes an explicit `is_tty` flag.
    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

/// Write a value to a provided writer.
///
/// - `Human`: calls `human_fn` to produce a human-readable string.
/// - `Json`: serializes `value` as JSON.
pub fn write_output<W, T, F>(
    writer: &mut W,
    format: OutputFormat,
    value: &T,
    human_fn: F,
) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => {
            writeln!(writer, "{}", human_fn(value))
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *writer, value).map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

/// Report a finished bridge call.
///
/// JSON consumers always get the full result on stdout; humans get failures
/// on stderr.
pub fn print_result(format: OutputFormat, result: &BridgeResult) -> io::Result<()> {
    if format == OutputFormat::Human && !result.ok {
        print_error(format, result_error_code(result), &render_failure_human(result));
        return Ok(());
    }
    let mut out = io::stdout().lock();
    write_output(&mut out, format, result, render_success_human)
}

/// Write an error to stderr in the selected format.
pub fn print_error(format: OutputFormat, code: &str, message: &str) {
    let mut err = io::stderr().lock();
    match format {
        OutputFormat::Human => {
            let line =
                render_human_stderr_line("error", message, io::stderr().is_terminal(), ANSI_RED);
            let _ = writeln!(err, "{line}");
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "error": {
                    "code": code,
                    "message": message,
                }
            });
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

/// Print a mapped error for a command that could not run at all.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    let (code, message) = actionable_error(error);
    print_error(format, code, &message);
}

fn actionable_error(error: &anyhow::Error) -> (&'static str, String) {
    let message = format!("{error:#}");
    for cause in error.chain() {
        if cause.downcast_ref::<UsageError>().is_some() {
            return ("USAGE_ERROR", message);
        }
        if cause.downcast_ref::<TransportError>().is_some() {
            return (
                "CLIENT_ERROR",
                format!("{message}. Check SHEETBRIDGE_RPC_URL and SHEETBRIDGE_APP_ORIGIN"),
            );
        }
    }
    ("CLI_ERROR", message)
}

fn result_error_code(result: &BridgeResult) -> &'static str {
    match result.error_message() {
        Some(NO_RESULT) => "NO_RESULT",
        Some(RELAY_FAILED) => "RELAY_FAILED",
        _ => "REMOTE_ERROR",
    }
}

fn render_success_human(result: &BridgeResult) -> String {
    let mut lines = vec![status_line("ok", result)];
    if let Some(data) = &result.data {
        lines.push(render_data(data));
    }
    lines.join("\n")
}

fn render_failure_human(result: &BridgeResult) -> String {
    let message = result.error_message().filter(|m| !m.is_empty()).unwrap_or("operation failed");
    let mut rendered = status_line(message, result);
    if let Some(details) = result.error.as_ref().and_then(|error| error.details.as_ref()) {
        rendered.push_str(&format!("\n{details}"));
    }
    rendered
}

fn status_line(label: &str, result: &BridgeResult) -> String {
    match result.ms {
        Some(ms) => format!("{label} ({}, {ms} ms)", result.mode),
        None => format!("{label} ({})", result.mode),
    }
}

// Range reads come back as a bare matrix or as `{"values": [[..], ..]}`;
// show either as tab-separated rows.
fn render_data(data: &Value) -> String {
    match matrix_rows(data).or_else(|| data.get("values").and_then(matrix_rows)) {
        Some(rows) => rows
            .iter()
            .map(|row| {
                row.as_array()
                    .map(|cells| cells.iter().map(render_cell).collect::<Vec<_>>().join("\t"))
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .join("\n"),
        None => serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string()),
    }
}

fn matrix_rows(value: &Value) -> Option<&Vec<Value>> {
    value.as_array().filter(|rows| !rows.is_empty() && rows.iter().all(Value::is_array))
}

fn render_cell(cell: &Value) -> String {
    match cell {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn render_human_stderr_line(label: &str, message: &str, is_tty: bool, color: &str) -> String {
    if is_tty {
        format!("{color}{label}:{ANSI_RESET} {message}")
    } else {
        format!("{label}: {message}")
    }
}
