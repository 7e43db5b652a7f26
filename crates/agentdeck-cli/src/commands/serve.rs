//! Serve command.

use agentdeck_agent::{AgentConnector, CliConnector, Relay, ReplayConnector};
use agentdeck_core::config::Config;
use agentdeck_gateway::{AppState, Gateway};
use agentdeck_store::{Database, SessionCache, SqliteStore, WorkspaceStore};
use anyhow::Context;
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Serve command arguments.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Host to bind
    #[arg(long, env = "AGENTDECK_HOST")]
    pub host: Option<String>,

    /// Port number
    #[arg(short, long, env = "AGENTDECK_PORT")]
    pub port: Option<u16>,

    /// SQLite database file
    #[arg(long, env = "AGENTDECK_DATABASE")]
    pub database: Option<PathBuf>,

    /// Root directory for session workspaces
    #[arg(long, env = "AGENTDECK_WORKSPACE_ROOT")]
    pub workspace_root: Option<PathBuf>,

    /// Replay a recorded JSONL transcript instead of running the agent
    #[arg(long)]
    pub replay: Option<PathBuf>,
}

impl ServeArgs {
    /// Overlay command-line values onto the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(database) = &self.database {
            config.database.path = Some(database.clone());
        }
        if let Some(root) = &self.workspace_root {
            config.workspace.root = Some(root.clone());
        }
        if let Some(replay) = &self.replay {
            config.agent.replay_file = Some(replay.clone());
        }
    }
}

/// Run the serve command.
pub async fn run(args: ServeArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = Config::load_or_default(config_path).context("failed to load config")?;
    args.apply(&mut config);
    config.validate()?;

    let state = build_state(&config).await?;
    Gateway::new(config.server.clone(), state).run().await?;
    Ok(())
}

/// Wire the store, upstream connector and relay from configuration.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let db_path = config.database_path()?;
    let db = Database::connect(&db_path, config.database.max_connections)
        .await
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    let workspace_root = config.workspace_root()?;
    tokio::fs::create_dir_all(&workspace_root)
        .await
        .with_context(|| format!("failed to create {}", workspace_root.display()))?;
    let workspaces = WorkspaceStore::new(&workspace_root);

    let store = Arc::new(SqliteStore::new(
        db,
        workspaces.clone(),
        SessionCache::new(Duration::from_secs(config.cache.ttl_secs)),
        config.workspace.max_sessions,
    ));

    let connector: Arc<dyn AgentConnector> = match &config.agent.replay_file {
        Some(path) => {
            info!(path = %path.display(), "replaying recorded transcript");
            Arc::new(ReplayConnector::from_file(path))
        }
        None => {
            info!(command = %config.agent.command, "using agent command");
            Arc::new(CliConnector::from_config(&config.agent))
        }
    };

    let relay = Relay::new(store.clone(), store.clone(), connector, &config.relay);

    Ok(AppState {
        registry: store.clone(),
        turns: store,
        workspaces,
        relay,
        default_permission_mode: config.agent.default_permission_mode,
    })
}
