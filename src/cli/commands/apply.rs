//! apply command - Apply a payload of replicated revisions

use crate::cli::Context;
use crate::core::config::Config;
use crate::core::payload::parse_requests;
use crate::core::types::{OwnerId, RepositoryId};
use crate::engine::{ApplyError, ApplyOrchestrator, BatchOutcome};
use crate::git::GitRepositories;
use anyhow::{bail, Context as _, Result};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Apply the revisions in `payload` to `repository`.
pub fn apply(
    ctx: &Context,
    repository: &str,
    owner: Option<&str>,
    payload: &Path,
    json: bool,
) -> Result<()> {
    let config = Config::load(ctx.config.as_deref()).context("Failed to load config")?;
    let repository = RepositoryId::new(repository).context("Invalid repository name")?;
    let owner = match owner {
        Some(id) => OwnerId::new(id).context("Invalid owner id")?,
        None => OwnerId::generate(),
    };

    let text = read_payload(payload)?;
    let requests = parse_requests(&text).context("Failed to parse payload")?;

    let repositories = Arc::new(GitRepositories::new(config.base_path()));
    let orchestrator = ApplyOrchestrator::from_config(&config, repositories);

    match orchestrator.apply_batch(&repository, &owner, requests) {
        Ok(outcome) => print_outcome(ctx, &outcome, json),
        Err(ApplyError::BatchUpdateFailed { outcome, class }) => {
            print_outcome(ctx, &outcome, json)?;
            bail!("Batch update {} for {}", class, repository)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to apply to {}", repository)),
    }
}

fn read_payload(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read payload from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload {}", path.display()))
}

fn print_outcome(ctx: &Context, outcome: &BatchOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    if ctx.quiet {
        return Ok(());
    }

    for r in &outcome.refs {
        println!(
            "{:<40} {}..{} {}",
            r.ref_name().as_str(),
            r.transition.old_id.short(7),
            r.transition.new_id.short(7),
            r.result
        );
    }
    Ok(())
}
