//! Configuration for meshgate.
//!
//! TOML file (gateway, monitor tuning, device list), environment overrides,
//! translation to `meshgate_core::ControllerConfig`, and a file-backed
//! [`AddressStore`] so a gateway that moved is remembered across runs.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use meshgate_core::{
    AddressStore, BUTTON_SUB_ADDRESS_OFFSET, ControllerConfig, CoreError, DeviceClass,
    DeviceDefinition, GatewayAddress,
};

/// Environment prefix; nested keys use `__`, e.g. `MESHGATE_GATEWAY__HOST`.
pub const ENV_PREFIX: &str = "MESHGATE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub monitor: MonitorSection,

    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}

/// `[gateway]`: where the gateway is and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewaySection {
    /// Fixed host. Omit to discover via multicast DNS.
    pub host: Option<String>,
    /// Accept only a gateway advertising this serial.
    pub serial: Option<String>,
    pub command_port: u16,
    pub event_port: u16,
    pub event_bind: String,
    /// Command timeout, seconds.
    pub timeout: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        let core = ControllerConfig::default();
        Self {
            host: None,
            serial: None,
            command_port: core.command_port,
            event_port: core.event_port,
            event_bind: core.event_bind.to_string(),
            timeout: core.timeout.as_secs(),
        }
    }
}

/// `[monitor]`: liveness and reconciliation tuning. Seconds unless noted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorSection {
    pub ping_interval: u64,
    pub failure_threshold: u32,
    pub address_check_interval: u64,
    pub discovery_timeout: u64,
    pub listen_backoff_ms: u64,
    pub status_base: u16,
}

impl Default for MonitorSection {
    fn default() -> Self {
        let core = ControllerConfig::default();
        Self {
            ping_interval: core.ping_interval.as_secs(),
            failure_threshold: core.failure_threshold,
            address_check_interval: core.address_check_interval.as_secs(),
            discovery_timeout: core.discovery_timeout.as_secs(),
            listen_backoff_ms: u64::try_from(core.listen_backoff.as_millis()).unwrap_or(1000),
            status_base: core.status_base,
        }
    }
}

/// `[[devices]]`: one output. Give either `sub_address` or `button`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceEntry {
    pub board: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_address: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<u16>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default = "default_class")]
    pub class: DeviceClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<u8>,
}

fn default_class() -> DeviceClass {
    DeviceClass::Switch
}

impl DeviceEntry {
    pub fn to_definition(&self) -> Result<DeviceDefinition, ConfigError> {
        let field = || format!("devices.{}", self.name);
        if self.board.trim().is_empty() {
            return Err(invalid(field(), "board must not be empty"));
        }
        let def = match (self.sub_address, self.button) {
            (Some(sub), None) => DeviceDefinition::new(&self.board, sub, &self.name, self.class),
            (None, Some(button)) => {
                DeviceDefinition::from_button(&self.board, button, &self.name, self.class)
                    .map_err(|_| {
                        invalid(
                            field(),
                            format!(
                                "button {button} exceeds the maximum of {}",
                                u16::MAX - BUTTON_SUB_ADDRESS_OFFSET
                            ),
                        )
                    })?
            }
            (Some(_), Some(_)) => {
                return Err(invalid(field(), "set either sub_address or button, not both"));
            }
            (None, None) => return Err(invalid(field(), "missing sub_address or button")),
        };
        let def = match &self.room {
            Some(room) => def.with_room(room),
            None => def,
        };
        Ok(match self.initial_state {
            Some(state) => def.with_initial_state(state),
            None => def,
        })
    }
}

impl Config {
    pub fn device_definitions(&self) -> Result<Vec<DeviceDefinition>, ConfigError> {
        self.devices.iter().map(DeviceEntry::to_definition).collect()
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "meshgate", "meshgate").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("meshgate");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the default path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Defaults, then the TOML file at `path` (if present), then `MESHGATE_*`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if anything goes wrong.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// The file alone, no env overlay. Missing file → defaults.
fn read_file_config(path: &Path) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(toml::from_str(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(e.into()),
    }
}

// ── Config saving ───────────────────────────────────────────────────

pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation to ControllerConfig ─────────────────────────────────

/// Build a validated `ControllerConfig`.
pub fn to_controller_config(cfg: &Config) -> Result<ControllerConfig, ConfigError> {
    let gateway = &cfg.gateway;
    let monitor = &cfg.monitor;

    let host = gateway
        .host
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(|h| {
            GatewayAddress::parse(h)
                .map(String::from)
                .map_err(|e| invalid("gateway.host", e.to_string()))
        })
        .transpose()?;

    let event_bind: IpAddr = gateway
        .event_bind
        .parse()
        .map_err(|_| invalid("gateway.event_bind", format!("not an IP address: {}", gateway.event_bind)))?;

    if gateway.timeout == 0 {
        return Err(invalid("gateway.timeout", "must be at least 1 second"));
    }
    if monitor.failure_threshold == 0 {
        return Err(invalid("monitor.failure_threshold", "must be at least 1"));
    }
    if monitor.discovery_timeout == 0 {
        return Err(invalid("monitor.discovery_timeout", "must be at least 1 second"));
    }

    Ok(ControllerConfig {
        host,
        expected_serial: gateway.serial.clone().filter(|s| !s.is_empty()),
        command_port: gateway.command_port,
        event_port: gateway.event_port,
        event_bind,
        timeout: Duration::from_secs(gateway.timeout),
        ping_interval: Duration::from_secs(monitor.ping_interval),
        failure_threshold: monitor.failure_threshold,
        address_check_interval: Duration::from_secs(monitor.address_check_interval),
        discovery_timeout: Duration::from_secs(monitor.discovery_timeout),
        listen_backoff: Duration::from_millis(monitor.listen_backoff_ms),
        status_base: monitor.status_base,
    })
}

// ── Address persistence ─────────────────────────────────────────────

/// Rewrites `gateway.host` in a config file when the gateway moves.
///
/// Only the file's own contents are round-tripped; environment overrides
/// are never written back.
#[derive(Debug, Clone)]
pub struct FileAddressStore {
    path: PathBuf,
}

impl FileAddressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_host(&self, address: &GatewayAddress) -> Result<(), ConfigError> {
        let mut cfg = read_file_config(&self.path)?;
        if cfg.gateway.host.as_deref() == Some(address.as_str()) {
            return Ok(());
        }
        cfg.gateway.host = Some(address.to_string());
        save_config_to(&cfg, &self.path)?;
        info!(path = %self.path.display(), address = %address, "gateway address saved");
        Ok(())
    }
}

impl AddressStore for FileAddressStore {
    fn persist(&self, address: &GatewayAddress) -> Result<(), CoreError> {
        self.write_host(address).map_err(|e| CoreError::Config {
            message: e.to_string(),
        })
    }
}
