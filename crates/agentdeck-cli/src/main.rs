//! AgentDeck CLI entry point.

use agentdeck_cli::{init_logging, run, Cli};
use agentdeck_core::config::{Config, LoggingConfig};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A broken config file is reported by the command itself.
    let logging = Config::load_or_default(cli.config.as_deref())
        .map(|config| config.logging)
        .unwrap_or_else(|_| LoggingConfig::default());
    init_logging(cli.verbose, &logging);

    run(cli).await
}
