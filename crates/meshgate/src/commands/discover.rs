//! `meshgate discover`: one multicast query, print the first answer.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use meshgate_api::discovery::{Discoverer, IDENTITY_KEY};
use meshgate_core::CoreError;

use crate::cli::{DiscoverArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct DiscoveredView {
    address: String,
    serial: Option<String>,
    txt: BTreeMap<String, String>,
}

pub async fn handle(args: DiscoverArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load_config(global)?;
    let serial = args.serial.or(cfg.gateway.serial);
    // `--timeout` bounds the discovery wait here, not command requests.
    let within = Duration::from_secs(global.timeout.unwrap_or(cfg.monitor.discovery_timeout));
    if within.is_zero() {
        return Err(CliError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    tracing::debug!(serial = ?serial, timeout_secs = within.as_secs(), "discovering gateway");
    let found = Discoverer::new()
        .expected_serial(serial)
        .discover(within)
        .await
        .map_err(CoreError::from)?;

    let view = DiscoveredView {
        address: found.address.to_string(),
        serial: found.serial().map(str::to_owned),
        txt: found.txt.into_iter().collect(),
    };
    let out = output::render_single(
        global.output,
        &view,
        |v| {
            let mut pairs = vec![
                ("Address", v.address.clone()),
                ("Serial", v.serial.clone().unwrap_or_else(|| "-".into())),
            ];
            pairs.extend(
                v.txt
                    .iter()
                    .filter(|(k, _)| k.as_str() != IDENTITY_KEY)
                    .map(|(k, val)| (k.as_str(), val.clone())),
            );
            output::detail_block(&pairs)
        },
        |v| v.address.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
