// `sheetbridge get`: read a range.

use clap::Args;
use sheetbridge_common::types::Operation;

use super::SessionArgs;
use crate::exit_code::ExitCode;

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Range address (e.g. `Sheet1!A1:B2`).
    pub address: String,

    #[command(flatten)]
    pub session: SessionArgs,
}

impl GetArgs {
    fn operation(&self) -> Operation {
        Operation::get_range(self.address.clone())
    }
}

pub fn run(args: GetArgs) -> anyhow::Result<ExitCode> {
    super::execute(args.operation(), &args.session)
}
