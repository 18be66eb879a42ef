//! `meshgate watch`: run the controller and print every state change and
//! connectivity transition until Ctrl-C or `--duration` elapses.

use std::time::Duration;

use chrono::{DateTime, Local};
use owo_colors::OwoColorize;
use serde::Serialize;

use meshgate_config::FileAddressStore;
use meshgate_core::{Controller, Device};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WatchEvent {
    State {
        timestamp: DateTime<Local>,
        key: String,
        name: String,
        state: u8,
    },
    Connection {
        timestamp: DateTime<Local>,
        connected: bool,
    },
}

/// Prints events as they happen: JSON lines for the JSON formats,
/// timestamped text otherwise.
#[derive(Debug, Clone, Copy)]
struct Printer {
    format: OutputFormat,
    quiet: bool,
    color: bool,
}

impl Printer {
    fn emit(self, event: &WatchEvent) {
        let line = match self.format {
            OutputFormat::Json | OutputFormat::JsonCompact => {
                match serde_json::to_string(event) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode watch event");
                        return;
                    }
                }
            }
            OutputFormat::Table | OutputFormat::Plain => self.text(event),
        };
        output::print_output(&line, self.quiet);
    }

    fn text(self, event: &WatchEvent) -> String {
        match event {
            WatchEvent::State {
                timestamp,
                key,
                name,
                state,
            } => {
                let ts = timestamp.format("%H:%M:%S").to_string();
                let ts = if self.color { ts.dimmed().to_string() } else { ts };
                format!(
                    "{ts} {name} ({key}) {} state={state}",
                    output::paint_power(*state > 0, self.color)
                )
            }
            WatchEvent::Connection {
                timestamp,
                connected,
            } => {
                let ts = timestamp.format("%H:%M:%S").to_string();
                let ts = if self.color { ts.dimmed().to_string() } else { ts };
                format!("{ts} gateway {}", output::paint_connected(*connected, self.color))
            }
        }
    }
}

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load_config(global)?;
    let (controller_config, definitions) = util::controller_inputs(&cfg)?;

    let controller = Controller::new(controller_config, definitions)?
        .with_address_store(FileAddressStore::new(util::config_file(global)));

    let printer = Printer {
        format: global.output,
        quiet: global.quiet,
        color: output::should_color(),
    };
    for device in controller.devices() {
        device.set_observer(move |d: &Device, state: u8| {
            printer.emit(&WatchEvent::State {
                timestamp: Local::now(),
                key: d.key().to_string(),
                name: d.name().to_owned(),
                state,
            });
        });
    }

    // Subscribe before starting so the first probe's result is reported.
    let mut connection = controller.connection_state();
    let connectivity = tokio::spawn(async move {
        while connection.changed().await.is_ok() {
            let connected = *connection.borrow_and_update();
            printer.emit(&WatchEvent::Connection {
                timestamp: Local::now(),
                connected,
            });
        }
    });

    if let Err(e) = controller.start().await {
        connectivity.abort();
        return Err(e.into());
    }
    if let Some(address) = controller.gateway_address() {
        if !global.quiet {
            eprintln!("Watching gateway at {address} (Ctrl-C to stop)");
        }
    }

    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            }
        }
        () = deadline => {}
    }

    controller.stop().await;
    connectivity.abort();
    for device in controller.devices() {
        device.clear_observer();
    }
    Ok(())
}
