// meshgate-api: wire layer for LAN mesh gateways
//
// Discovery (multicast DNS query + TXT record parsing), the outbound HTTP
// command channel, and the inbound UDP event stream. Nothing here knows about
// logical devices; `meshgate-core` maps frames onto its registry.

pub mod client;
pub mod discovery;
pub mod error;
pub mod events;
pub mod frame;
pub mod record;
pub mod transport;

pub use client::{BROADCAST_ADDR, CommandRequest, DEFAULT_COMMAND_PORT, GatewayClient};
pub use discovery::{Discovered, Discoverer};
pub use error::Error;
pub use events::{CloseHandle, DEFAULT_EVENT_PORT, EventListener};
pub use frame::{FrameUpdate, UpdateFrame};
pub use record::TxtRecord;
pub use transport::TransportConfig;
