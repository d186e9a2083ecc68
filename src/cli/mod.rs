//! cli
//!
//! Command-line interface layer for revsync.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and build the engine
//! - Does NOT touch repositories directly
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and hands decoded
//! payloads to the [`crate::engine::ApplyOrchestrator`]. All ref changes flow
//! through the engine.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use anyhow::Result;
use std::path::PathBuf;

/// Settings shared by every command handler.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Explicit configuration file
    pub config: Option<PathBuf>,
    pub debug: bool,
    pub quiet: bool,
}

/// Run the CLI with already parsed arguments.
///
/// This is the main entry point called from `main.rs`, after logging is set up.
pub fn run(cli: Cli) -> Result<()> {
    let ctx = Context {
        config: cli.config.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
    };

    commands::dispatch(cli.command, &ctx)
}
