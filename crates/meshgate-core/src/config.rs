// ── Runtime controller configuration ──
//
// Describes how to reach and supervise one gateway. Never touches disk:
// the CLI (via meshgate-config) builds a `ControllerConfig` and hands it in.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use meshgate_api::{DEFAULT_COMMAND_PORT, DEFAULT_EVENT_PORT, TransportConfig};

/// Default `all`-frame base: status `i` belongs to sub-address `17 + i`.
pub const DEFAULT_STATUS_BASE: u16 = 17;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Fixed gateway host. `None` = locate it via discovery.
    pub host: Option<String>,
    /// Only accept a gateway advertising this serial during discovery.
    pub expected_serial: Option<String>,
    pub command_port: u16,
    pub event_port: u16,
    /// Local address the event listener binds.
    pub event_bind: IpAddr,
    /// Per-request timeout for gateway commands.
    pub timeout: Duration,
    /// Liveness probe period. Zero disables the probe task.
    pub ping_interval: Duration,
    /// Consecutive failed probes before the gateway is considered down.
    pub failure_threshold: u32,
    /// Address re-check period. Zero disables the reconciler.
    pub address_check_interval: Duration,
    pub discovery_timeout: Duration,
    /// Pause after a failed event receive.
    pub listen_backoff: Duration,
    pub status_base: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: None,
            expected_serial: None,
            command_port: DEFAULT_COMMAND_PORT,
            event_port: DEFAULT_EVENT_PORT,
            event_bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            timeout: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
            failure_threshold: 3,
            address_check_interval: Duration::from_secs(60),
            discovery_timeout: Duration::from_secs(10),
            listen_backoff: Duration::from_secs(1),
            status_base: DEFAULT_STATUS_BASE,
        }
    }
}

impl ControllerConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Transport settings for the gateway command client.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default().with_timeout(self.timeout)
    }
}
