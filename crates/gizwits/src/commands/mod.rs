//! Command dispatch: bridges CLI args -> gateway operations -> output formatting.

pub mod attrs;
pub mod bind;
pub mod config_cmd;
pub mod devices;
pub mod subdevices;
pub mod util;
pub mod watch;

use gizwits_core::Gateway;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a gateway-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, gateway: &Gateway, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Devices => devices::handle(gateway, global).await,
        Command::Watch(args) => watch::handle(gateway, args, global).await,
        Command::Read(args) => attrs::read(gateway, args, global).await,
        Command::Write(args) => attrs::write(gateway, args, global).await,
        Command::Subdevices(args) => subdevices::handle(gateway, args, global).await,
        Command::Bind(args) => bind::handle(gateway, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
