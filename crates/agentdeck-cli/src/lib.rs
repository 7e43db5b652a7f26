//! AgentDeck command-line interface.

pub mod commands;

use agentdeck_core::config::LoggingConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// AgentDeck - streaming relay for coding agents
#[derive(Parser)]
#[command(name = "agentdeck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "AGENTDECK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve(commands::serve::ServeArgs),

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Show version information
    Version,
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve(args) => commands::serve::run(args, config_path).await,
        Commands::Config(args) => commands::config::run(args, config_path).await,
        Commands::Version => {
            println!("agentdeck {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_filter(verbose: u8, logging: &LoggingConfig) -> String {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    format!("agentdeck={level},tower_http={level}")
}

/// Install the global tracing subscriber.
pub fn init_logging(verbose: u8, logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose, logging)));

    let json = logging.json.then(|| tracing_subscriber::fmt::layer().json());
    let text = (!logging.json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();
}
