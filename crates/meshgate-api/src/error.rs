use thiserror::Error;

/// Top-level error type for the `meshgate-api` crate.
///
/// Covers every failure mode of the three wire surfaces: multicast
/// discovery, the HTTP command endpoint, and the UDP event stream.
/// `meshgate-core` maps these into domain-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Socket-level failure (bind, send, multicast options).
    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),

    // ── Discovery ───────────────────────────────────────────────────
    /// A discovery datagram could not be decoded.
    #[error("Malformed discovery record at byte {offset}: {reason}")]
    MalformedRecord { offset: usize, reason: &'static str },

    /// No gateway answered the multicast query in time.
    #[error("No gateway answered discovery within {timeout_secs}s")]
    DiscoveryTimeout { timeout_secs: u64 },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON decoding failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying on the
    /// next tick of a background task.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::DiscoveryTimeout { .. } | Self::Io(_) => true,
            _ => false,
        }
    }

    pub(crate) fn malformed(offset: usize, reason: &'static str) -> Self {
        Self::MalformedRecord { offset, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_transient() {
        assert!(Error::DiscoveryTimeout { timeout_secs: 10 }.is_transient());
    }

    #[test]
    fn malformed_record_is_not_transient() {
        let err = Error::malformed(12, "truncated header");
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "Malformed discovery record at byte 12: truncated header"
        );
    }
}
