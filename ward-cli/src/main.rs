//! Ward CLI - Migration safety engine for local databases.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ward_cli::cli::{Cli, Command};
use ward_cli::commands;
use ward_cli::error::CliResult;
use ward_cli::output;

/// Environment variable controlling log filtering.
const LOG_ENV: &str = "WARD_LOG";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Run the CLI and handle errors
    if let Err(e) = run(cli).await {
        output::newline();
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Command::Migrate(args) => commands::migrate::run(args).await,
        Command::Version => commands::version::run().await,
    }
}
