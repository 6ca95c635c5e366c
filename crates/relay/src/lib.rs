// sheetbridge-relay: same-origin relay channel for spreadsheet sessions that
// the direct RPC channel cannot reach.

pub mod api;
pub mod config;
pub mod error;
pub mod hub;
pub mod server;

pub use config::RelayConfig;
pub use hub::RelayHub;
