//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Use this configuration file
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// revsync - Apply pull-replicated git revisions to local repositories
#[derive(Parser, Debug)]
#[command(name = "revsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (overrides discovery)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply a batch of replicated revisions to a repository
    #[command(
        name = "apply",
        long_about = "Apply a batch of replicated revisions to a repository.\n\n\
            Reads a JSON list of revisions (ref name plus commit, tree, and blob \
            objects), writes the objects into the repository, and moves every ref \
            in one batch. The repository is locked for the duration of the apply.\n\n\
            The exit status is non-zero if any ref did not reach its requested value.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Apply a payload to <base_path>/platform/api.git
    revsync apply --repo platform/api payload.json

    # Read the payload from stdin and print per-ref outcomes as JSON
    cat payload.json | revsync apply --repo platform/api --json -

    # Identify the replication task holding the lock
    revsync apply --repo platform/api --owner fetch-worker-3 payload.json"
    )]
    Apply {
        /// Repository name, relative to the configured base path
        #[arg(long = "repo", value_name = "NAME")]
        repository: String,

        /// Lock owner id (generated when omitted)
        #[arg(long, value_name = "ID")]
        owner: Option<String>,

        /// Payload file, or `-` for stdin
        #[arg(value_name = "PAYLOAD")]
        payload: PathBuf,

        /// Print per-ref outcomes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    #[command(
        name = "config",
        long_about = "Show the effective configuration.\n\n\
            Prints every setting with defaults filled in, and the file it was \
            loaded from if any."
    )]
    Config {
        /// Print as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell. Add the output \
            to your shell's configuration to enable tab-completion for revsync commands.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    revsync completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    revsync completion zsh >> ~/.zshrc

    # Fish
    revsync completion fish > ~/.config/fish/completions/revsync.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
