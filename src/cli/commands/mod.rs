//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the engine to execute the command
//! 3. Formats and displays output

mod apply;
mod completion;
mod config_cmd;

// Re-export command functions for testing and direct invocation
pub use apply::apply;
pub use completion::completion;
pub use config_cmd::show as config_show;

use super::args::Command;
use super::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Apply {
            repository,
            owner,
            payload,
            json,
        } => apply::apply(ctx, &repository, owner.as_deref(), &payload, json),
        Command::Config { json } => config_cmd::show(ctx, json),
        Command::Completion { shell } => completion::completion(shell),
    }
}
