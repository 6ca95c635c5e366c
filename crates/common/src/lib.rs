// sheetbridge-common: wire types shared by the bridge client, relay host and CLI.

pub mod protocol;
pub mod types;
