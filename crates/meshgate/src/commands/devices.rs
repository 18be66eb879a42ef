//! Device listing and inspection.
//!
//! Both subcommands work from configuration alone; `list --live` starts
//! the controller briefly so the gateway's status frames fill in states.

use std::time::Duration;

use meshgate_core::Controller;

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;

use super::util::{self, DeviceView};

/// How long `--live` waits for status frames after the request.
const LIVE_SETTLE: Duration = Duration::from_millis(1500);

pub async fn handle(args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load_config(global)?;

    match args.command {
        DevicesCommand::List { live: false } => {
            let registry = util::offline_registry(&cfg)?;
            let views: Vec<DeviceView> = registry
                .devices()
                .iter()
                .map(|d| DeviceView::from(d.as_ref()))
                .collect();
            util::render_devices(global, &views)
        }

        DevicesCommand::List { live: true } => {
            let (controller_config, definitions) = util::controller_inputs(&cfg)?;
            let controller = Controller::new(controller_config, definitions)?;
            controller.start().await?;
            tokio::time::sleep(LIVE_SETTLE).await;
            let views: Vec<DeviceView> = controller
                .devices()
                .iter()
                .map(|d| DeviceView::from(d.as_ref()))
                .collect();
            let connected = controller.is_connected();
            controller.stop().await;

            if !connected {
                tracing::warn!("gateway did not answer the status request; states may be stale");
            }
            util::render_devices(global, &views)
        }

        DevicesCommand::Get { device } => {
            let registry = util::offline_registry(&cfg)?;
            let found = registry.find(&device)?;
            util::render_device(global, &DeviceView::from(found.as_ref()))
        }
    }
}
