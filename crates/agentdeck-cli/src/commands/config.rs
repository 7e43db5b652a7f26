//! Configuration management commands.

use agentdeck_core::config::Config;
use agentdeck_core::paths;
use clap::Args;
use std::path::{Path, PathBuf};

/// Config command arguments.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(clap::Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Validate the configuration file
    Validate,

    /// Write a default configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = Config::load_or_default(config_path)?;
            println!("{}", config.to_json5()?);
        }

        ConfigCommand::Validate => {
            let path = resolve_path(config_path)?;
            let config = Config::load(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            config
                .validate()
                .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
            println!("Configuration is valid");
        }

        ConfigCommand::Init { force } => {
            let path = init(config_path, force)?;
            println!("Created config file: {}", path.display());
        }
    }

    Ok(())
}

fn resolve_path(config_path: Option<&Path>) -> anyhow::Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(paths::config_file()?),
    }
}

/// Write the default configuration, refusing to clobber an existing file.
pub fn init(config_path: Option<&Path>, force: bool) -> anyhow::Result<PathBuf> {
    let path = resolve_path(config_path)?;
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }
    Config::default().save(&path)?;
    Ok(path)
}
