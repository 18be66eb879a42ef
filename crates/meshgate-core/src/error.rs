// ── Core error types ──
//
// User-facing errors from meshgate-core. Consumers never see reqwest or
// socket errors directly; `From<meshgate_api::Error>` folds them into
// domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Discovery errors ─────────────────────────────────────────────
    #[error("No gateway answered discovery within {timeout_secs}s")]
    DiscoveryTimeout { timeout_secs: u64 },

    #[error("Malformed discovery record at byte {offset}: {reason}")]
    MalformedRecord { offset: usize, reason: String },

    #[error("Invalid gateway address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach gateway at {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Controller already started")]
    AlreadyRunning,

    // ── Device errors ────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Invalid fan speed {level} (expected 0-4)")]
    InvalidSpeed { level: u8 },

    #[error("Invalid state {value} for {class} device")]
    InvalidState { value: u8, class: String },

    #[error("{operation} is not supported by {class} devices")]
    Unsupported { operation: String, class: String },

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<meshgate_api::Error> for CoreError {
    fn from(err: meshgate_api::Error) -> Self {
        match err {
            meshgate_api::Error::Transport(ref e) if e.is_connect() || e.is_timeout() => {
                CoreError::ConnectionFailed {
                    address: e
                        .url()
                        .and_then(|u| u.host_str().map(str::to_owned))
                        .unwrap_or_else(|| "<unknown>".into()),
                    reason: e.to_string(),
                }
            }
            meshgate_api::Error::Transport(e) => CoreError::CommandFailed {
                message: e.to_string(),
            },
            meshgate_api::Error::InvalidUrl(e) => CoreError::InvalidAddress {
                address: String::new(),
                reason: e.to_string(),
            },
            meshgate_api::Error::Io(e) => CoreError::ConnectionFailed {
                address: "<socket>".into(),
                reason: e.to_string(),
            },
            meshgate_api::Error::MalformedRecord { offset, reason } => CoreError::MalformedRecord {
                offset,
                reason: reason.to_owned(),
            },
            meshgate_api::Error::DiscoveryTimeout { timeout_secs } => {
                CoreError::DiscoveryTimeout { timeout_secs }
            }
            meshgate_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
