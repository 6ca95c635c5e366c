// sheetbridge-client: issues spreadsheet operations over the direct RPC
// channel and falls back to the relay channel when the server asks for it.

pub mod bridge;
pub mod config;
pub mod transport;

pub use bridge::BridgeClient;
pub use config::BridgeConfig;
pub use transport::{DirectTransport, RelayTransport, TransportError};
