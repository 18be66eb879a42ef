//! Shared helpers for command handlers.

use std::path::PathBuf;

use serde::Serialize;
use tabled::Tabled;

use meshgate_config::Config;
use meshgate_core::{ControllerConfig, Device, DeviceClass, DeviceDefinition, DeviceRegistry};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Config file in effect: `--config`, else the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(meshgate_config::config_path)
}

/// Load the config file (if any) with env overrides, then apply the
/// `--host` / `--timeout` flags on top.
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = meshgate_config::load_config_from(&config_file(global))?;
    if let Some(host) = &global.host {
        cfg.gateway.host = Some(host.clone());
    }
    if let Some(secs) = global.timeout {
        cfg.gateway.timeout = secs;
    }
    Ok(cfg)
}

/// Everything a controller-bound command needs from the config.
pub fn controller_inputs(
    cfg: &Config,
) -> Result<(ControllerConfig, Vec<DeviceDefinition>), CliError> {
    let controller_config = meshgate_config::to_controller_config(cfg)?;
    let definitions = cfg.device_definitions()?;
    Ok((controller_config, definitions))
}

/// Registry built from configuration only, for commands that never
/// touch the network.
pub fn offline_registry(cfg: &Config) -> Result<DeviceRegistry, CliError> {
    let definitions = cfg.device_definitions()?;
    Ok(DeviceRegistry::new(&definitions)?.with_status_base(cfg.monitor.status_base))
}

// ── Device views ────────────────────────────────────────────────────

/// Serializable snapshot of one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceView {
    pub key: String,
    pub name: String,
    pub room: Option<String>,
    pub class: DeviceClass,
    pub state: u8,
    pub on: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<u8>,
}

impl From<&Device> for DeviceView {
    fn from(d: &Device) -> Self {
        Self {
            key: d.key().to_string(),
            name: d.name().to_owned(),
            room: d.room().map(str::to_owned),
            class: d.class(),
            state: d.state(),
            on: d.is_on(),
            speed: d.speed(),
        }
    }
}

#[derive(Tabled)]
pub struct DeviceRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Room")]
    pub room: String,
    #[tabled(rename = "Class")]
    pub class: String,
    #[tabled(rename = "Power")]
    pub power: String,
    #[tabled(rename = "State")]
    pub state: String,
}

impl DeviceRow {
    pub fn from_view(v: &DeviceView, color: bool) -> Self {
        Self {
            key: v.key.clone(),
            name: v.name.clone(),
            room: v.room.clone().unwrap_or_default(),
            class: v.class.to_string(),
            power: output::paint_power(v.on, color),
            state: state_label(v),
        }
    }
}

/// `1` for switches, `50% (speed 2)` for fans.
pub fn state_label(v: &DeviceView) -> String {
    match v.speed {
        Some(speed) => format!("{}% (speed {speed})", v.state),
        None => v.state.to_string(),
    }
}

pub fn device_detail(v: &DeviceView, color: bool) -> String {
    output::detail_block(&[
        ("Key", v.key.clone()),
        ("Name", v.name.clone()),
        ("Room", v.room.clone().unwrap_or_else(|| "-".into())),
        ("Class", v.class.to_string()),
        ("Power", output::paint_power(v.on, color)),
        ("State", state_label(v)),
    ])
}

pub fn render_devices(global: &GlobalOpts, views: &[DeviceView]) -> Result<(), CliError> {
    let color = output::should_color();
    let out = output::render_list(
        global.output,
        views,
        |v| DeviceRow::from_view(v, color),
        |v| v.key.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub fn render_device(global: &GlobalOpts, view: &DeviceView) -> Result<(), CliError> {
    let color = output::should_color();
    let out = output::render_single(
        global.output,
        view,
        |v| device_detail(v, color),
        |v| format!("{}\t{}", v.key, v.state),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
