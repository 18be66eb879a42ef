// ── Gateway address ──
//
// The gateway's LAN address is either an IPv4 literal or a hostname. It is
// validated once on construction and then treated as an opaque host string.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// A validated IPv4 literal or RFC 1123 hostname.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GatewayAddress(String);

impl GatewayAddress {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let host = raw.trim();
        if host.parse::<Ipv4Addr>().is_ok() {
            return Ok(Self(host.to_owned()));
        }
        validate_hostname(host).map_err(|reason| CoreError::InvalidAddress {
            address: raw.to_owned(),
            reason: reason.to_owned(),
        })?;
        Ok(Self(host.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_ip(&self) -> bool {
        self.0.parse::<Ipv4Addr>().is_ok()
    }
}

fn validate_hostname(host: &str) -> Result<(), &'static str> {
    if host.is_empty() {
        return Err("empty host");
    }
    if host.len() > MAX_HOSTNAME_LEN {
        return Err("hostname too long");
    }
    // A trailing dot denotes the root and is allowed.
    for label in host.strip_suffix('.').unwrap_or(host).split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err("hostname label must be 1-63 characters");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err("hostname label cannot start or end with '-'");
        }
        if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err("hostname may only contain letters, digits, '-' and '.'");
        }
    }
    // All-numeric dotted strings that failed IPv4 parsing (e.g. 300.1.1.1).
    if host.split('.').all(|l| l.bytes().all(|b| b.is_ascii_digit())) {
        return Err("not a valid IPv4 address");
    }
    Ok(())
}

impl fmt::Display for GatewayAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GatewayAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for GatewayAddress {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GatewayAddress> for String {
    fn from(addr: GatewayAddress) -> Self {
        addr.0
    }
}

impl From<Ipv4Addr> for GatewayAddress {
    fn from(ip: Ipv4Addr) -> Self {
        Self(ip.to_string())
    }
}

impl TryFrom<IpAddr> for GatewayAddress {
    type Error = CoreError;

    fn try_from(ip: IpAddr) -> Result<Self, Self::Error> {
        match ip {
            IpAddr::V4(v4) => Ok(v4.into()),
            IpAddr::V6(v6) => Err(CoreError::InvalidAddress {
                address: v6.to_string(),
                reason: "IPv6 gateways are not supported".into(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ipv4_and_hostnames() {
        assert_eq!(GatewayAddress::parse("192.168.1.40").unwrap().as_str(), "192.168.1.40");
        assert!(GatewayAddress::parse("192.168.1.40").unwrap().is_ip());
        assert_eq!(GatewayAddress::parse(" Mesh-GW.local ").unwrap().as_str(), "mesh-gw.local");
        assert!(GatewayAddress::parse("localhost").is_ok());
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "300.1.1.1", "gw_1.local", "-gw.local", "a..b", "http://gw"] {
            assert!(
                matches!(GatewayAddress::parse(bad), Err(CoreError::InvalidAddress { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn ipv6_is_rejected() {
        let ip: IpAddr = "::1".parse().unwrap();
        assert!(GatewayAddress::try_from(ip).is_err());
    }
}
