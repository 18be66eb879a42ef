//! Command dispatch: bridges CLI args -> controller calls -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod devices;
pub mod discover;
pub mod util;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

use self::control::Action;

/// Dispatch a gateway-bound command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Discover(args) => discover::handle(args, global).await,
        Command::Devices(args) => devices::handle(args, global).await,
        Command::On(args) => control::handle(args.device, Action::On, global).await,
        Command::Off(args) => control::handle(args.device, Action::Off, global).await,
        Command::Speed(args) => {
            control::handle(args.device, Action::Speed(args.level), global).await
        }
        Command::Set(args) => control::handle(args.device, Action::Set(args.state), global).await,
        Command::Status => control::status(global).await,
        Command::Watch(args) => watch::handle(args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command must be handled before dispatch".into(),
        )),
    }
}
