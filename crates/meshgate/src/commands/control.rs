//! Output commands: `on`, `off`, `speed`, `set`, `status`.
//!
//! Each runs through [`Controller::oneshot`]: resolve the gateway, send a
//! single command, print the device's resulting state.

use meshgate_core::{Controller, CoreError};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util::{self, DeviceView};

/// One command against one device.
#[derive(Debug, Clone, Copy)]
pub enum Action {
    On,
    Off,
    Speed(u8),
    Set(u8),
}

impl Action {
    fn describe(self) -> String {
        match self {
            Self::On => "on".into(),
            Self::Off => "off".into(),
            Self::Speed(level) => format!("speed {level}"),
            Self::Set(state) => format!("state {state}"),
        }
    }
}

pub async fn handle(identifier: String, action: Action, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load_config(global)?;
    let (controller_config, definitions) = util::controller_inputs(&cfg)?;

    // Fail on an unknown device before touching the network.
    util::offline_registry(&cfg)?.find(&identifier)?;

    let (accepted, view) = Controller::oneshot(controller_config, definitions, |c| async move {
        let device = c.find_device(&identifier)?;
        let key = device.key().clone();
        let accepted = match action {
            Action::On => c.turn_on(&key).await?,
            Action::Off => c.turn_off(&key).await?,
            Action::Speed(level) => c.set_speed(&key, level).await?,
            Action::Set(state) => c.set_state(&key, state).await?,
        };
        Ok::<_, CoreError>((accepted, DeviceView::from(device.as_ref())))
    })
    .await?;

    if !accepted {
        return Err(CliError::Rejected {
            device: view.name,
            action: action.describe(),
        });
    }
    tracing::info!(device = %view.key, state = view.state, "command accepted");
    util::render_device(global, &view)
}

pub async fn status(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load_config(global)?;
    let (controller_config, definitions) = util::controller_inputs(&cfg)?;

    let (accepted, address) = Controller::oneshot(controller_config, definitions, |c| async move {
        let accepted = c.request_status().await?;
        let address = c
            .gateway_address()
            .map(|a| a.to_string())
            .unwrap_or_default();
        Ok::<_, CoreError>((accepted, address))
    })
    .await?;

    if !accepted {
        return Err(CliError::Rejected {
            device: "all boards".into(),
            action: "status request".into(),
        });
    }
    output::print_output(&format!("Status requested from {address}"), global.quiet);
    Ok(())
}
