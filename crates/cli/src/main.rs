// sheetbridge CLI entry point.

use std::process;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_code;
mod output;

use exit_code::ExitCode;

#[derive(Parser)]
#[command(name = "sheetbridge", about = "Read and write live spreadsheet sessions")]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> process::ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let format = output::OutputFormat::detect(cli.command.json());
    match commands::run(cli.command) {
        Ok(code) => code.into(),
        Err(error) => {
            let code = ExitCode::from_error(&error);
            debug!(error = ?error, exit_code = code.code(), "command failed");
            output::print_anyhow_error(format, &error);
            code.into()
        }
    }
}

// Diagnostics go to stderr so stdout stays parseable.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("SHEETBRIDGE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
