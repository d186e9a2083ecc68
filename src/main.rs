//! revsync binary entry point.

use anyhow::Result;
use revsync::cli::{self, Cli};
use tracing_subscriber::EnvFilter;

/// Install the log subscriber.
///
/// `RUST_LOG` wins unless `--debug` or `--quiet` is given; the default is `info`.
fn init_tracing(debug: bool, quiet: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug, cli.quiet);
    cli::run(cli)
}
