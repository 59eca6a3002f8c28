//! Command dispatch: bridges CLI args -> coordinator intents -> output formatting.

pub mod account;
pub mod config_cmd;
pub mod device;
pub mod users;
pub mod util;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a gateway-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Login => account::login(global).await,
        Command::Register(args) => account::register(args, global).await,
        Command::Watch(args) => watch::handle(args, global).await,
        Command::Status => device::status(global).await,
        Command::Pump(args) => device::pump(args, global).await,
        Command::Auto => device::auto(global).await,
        Command::Device(args) => device::handle(args, global).await,
        Command::Users(args) => users::handle(args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
