//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use meshgate_config::ConfigError;
use meshgate_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the gateway at {address}")]
    #[diagnostic(
        code(meshgate::connection_failed),
        help(
            "Check that the gateway is powered and on this network.\n\
             Reason: {reason}\n\
             Try: meshgate discover"
        )
    )]
    ConnectionFailed { address: String, reason: String },

    #[error("No gateway answered discovery within {seconds}s")]
    #[diagnostic(
        code(meshgate::discovery_timeout),
        help(
            "Multicast may be blocked between this host and the gateway.\n\
             Set a fixed address with --host or `gateway.host` in the config file."
        )
    )]
    DiscoveryTimeout { seconds: u64 },

    #[error("Gateway rejected {action} for '{device}'")]
    #[diagnostic(
        code(meshgate::rejected),
        help("The gateway answered but did not confirm the command. Run: meshgate status")
    )]
    Rejected { device: String, action: String },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("Device '{identifier}' not found")]
    #[diagnostic(
        code(meshgate::not_found),
        help("Run: meshgate devices list to see configured devices")
    )]
    NotFound { identifier: String },

    #[error("{operation} is not supported by {class} devices")]
    #[diagnostic(code(meshgate::unsupported))]
    Unsupported { operation: String, class: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(meshgate::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(meshgate::config),
        help("Inspect the effective values with: meshgate config show")
    )]
    Config { message: String },

    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(meshgate::config_exists),
        help("Pass --force to overwrite it.")
    )]
    ConfigExists { path: String },

    // ── Everything else ──────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(meshgate::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    #[diagnostic(code(meshgate::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::DiscoveryTimeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::Validation { .. } | Self::Unsupported { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { address, reason } => {
                CliError::ConnectionFailed { address, reason }
            }

            CoreError::DiscoveryTimeout { timeout_secs } => CliError::DiscoveryTimeout {
                seconds: timeout_secs,
            },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound { identifier },

            CoreError::InvalidSpeed { level } => CliError::Validation {
                field: "level".into(),
                reason: format!("{level} is outside 0-4"),
            },

            CoreError::InvalidState { value, class } => CliError::Validation {
                field: "state".into(),
                reason: format!("{value} is out of range for a {class} device"),
            },

            CoreError::InvalidAddress { address, reason } => CliError::Validation {
                field: "host".into(),
                reason: format!("{address:?}: {reason}"),
            },

            CoreError::Unsupported { operation, class } => {
                CliError::Unsupported { operation, class }
            }

            CoreError::Config { message } => CliError::Config { message },

            other @ (CoreError::MalformedRecord { .. }
            | CoreError::AlreadyRunning
            | CoreError::CommandFailed { .. }
            | CoreError::Internal(_)) => CliError::Internal(other.to_string()),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
