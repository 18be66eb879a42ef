//! Multicast DNS discovery of the gateway.
//!
//! Sends a single PTR query for the gateway's service type and waits for
//! the first response carrying a `Serial` TXT entry (optionally a specific
//! one). Nothing is cached; every call is a fresh query.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout};
use tracing::debug;

use crate::error::Error;
use crate::record::{TxtRecord, build_ptr_query, parse_txt};

pub const MDNS_GROUP: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(224, 0, 0, 251), 5353));
pub const SERVICE_NAME: &str = "_toyama._tcp.local";
pub const IDENTITY_KEY: &str = "Serial";

const MULTICAST_TTL: u32 = 255;
const MAX_DATAGRAM_LEN: usize = 9000;

/// A gateway that answered discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    /// Source address of the answering datagram.
    pub address: IpAddr,
    pub txt: TxtRecord,
}

impl Discovered {
    pub fn serial(&self) -> Option<&str> {
        self.txt.get(IDENTITY_KEY).map(String::as_str)
    }
}

/// One-shot multicast discoverer.
#[derive(Debug, Clone)]
pub struct Discoverer {
    target: SocketAddr,
    service: String,
    expected_serial: Option<String>,
}

impl Default for Discoverer {
    fn default() -> Self {
        Self {
            target: MDNS_GROUP,
            service: SERVICE_NAME.to_owned(),
            expected_serial: None,
        }
    }
}

impl Discoverer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where the query is sent. Defaults to the mDNS group.
    pub fn target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Only accept a responder advertising this serial.
    pub fn expected_serial(mut self, serial: Option<String>) -> Self {
        self.expected_serial = serial;
        self
    }

    /// Query once and wait up to `within` for a qualifying answer.
    pub async fn discover(&self, within: Duration) -> Result<Discovered, Error> {
        let socket = UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], 0))).await?;
        socket.set_multicast_ttl_v4(MULTICAST_TTL)?;
        socket
            .send_to(&build_ptr_query(&self.service), self.target)
            .await?;
        debug!(target = %self.target, service = %self.service, "discovery query sent");

        let deadline = Instant::now() + within;
        let timed_out = || Error::DiscoveryTimeout {
            timeout_secs: within.as_secs(),
        };
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out());
            }

            let (len, peer) = match timeout(remaining, socket.recv_from(&mut buf)).await {
                Err(_) => return Err(timed_out()),
                Ok(Err(e)) => {
                    debug!(error = %e, "discovery receive failed");
                    continue;
                }
                Ok(Ok(received)) => received,
            };

            match self.accept(&buf[..len]) {
                Ok(Some(txt)) => {
                    debug!(peer = %peer, "gateway discovered");
                    return Ok(Discovered {
                        address: peer.ip(),
                        txt,
                    });
                }
                Ok(None) => debug!(peer = %peer, "ignoring non-matching discovery response"),
                Err(e) => debug!(peer = %peer, error = %e, "ignoring malformed discovery response"),
            }
        }
    }

    fn accept(&self, datagram: &[u8]) -> Result<Option<TxtRecord>, Error> {
        let Some(txt) = parse_txt(datagram, IDENTITY_KEY)? else {
            return Ok(None);
        };
        let wanted = self
            .expected_serial
            .as_ref()
            .is_none_or(|expected| txt.get(IDENTITY_KEY) == Some(expected));
        Ok(wanted.then_some(txt))
    }
}
