//! config command - Show the effective configuration

use crate::cli::Context;
use crate::core::config::Config;
use anyhow::{Context as _, Result};

/// Print every setting with defaults filled in.
pub fn show(ctx: &Context, json: bool) -> Result<()> {
    let config = Config::load(ctx.config.as_deref()).context("Failed to load config")?;
    let effective = config.effective();

    if json {
        println!("{}", serde_json::to_string_pretty(&effective)?);
        return Ok(());
    }

    if !ctx.quiet {
        match config.loaded_from() {
            Some(path) => println!("# Loaded from {}", path.display()),
            None => println!("# No configuration file found; using defaults"),
        }
    }
    print!(
        "{}",
        toml::to_string(&effective).context("Failed to render config")?
    );
    Ok(())
}
