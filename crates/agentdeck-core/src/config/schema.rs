//! Configuration schema definitions.

use crate::types::PermissionMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8000;

/// Main AgentDeck configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Workspace settings.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Upstream agent settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Relay tuning.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Session cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port number.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Allowed CORS origins. `"*"` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors: true,
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file. Defaults to ~/.agentdeck/agentdeck.db.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

/// Workspace configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root directory holding one workspace per session.
    /// Defaults to ~/.agentdeck/workspaces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Maximum number of active sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u32,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: None,
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_max_sessions() -> u32 {
    100
}

/// Upstream agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent executable.
    #[serde(default = "default_agent_command")]
    pub command: String,

    /// Extra arguments appended after the generated ones.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Environment passed to the agent process.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Permission mode used when a request does not name one.
    #[serde(default)]
    pub default_permission_mode: PermissionMode,

    /// Replay a recorded JSONL transcript instead of spawning the agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_file: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: default_agent_command(),
            extra_args: Vec::new(),
            env: HashMap::new(),
            model: None,
            default_permission_mode: PermissionMode::default(),
            replay_file: None,
        }
    }
}

fn default_agent_command() -> String {
    "claude".to_string()
}

/// Relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Outbound events buffered between the relay and a slow client.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Seconds a turn waits for an in-flight turn on the same session.
    /// Zero rejects immediately.
    #[serde(default = "default_turn_gate_timeout")]
    pub turn_gate_timeout_secs: u64,

    /// Seconds to wait for the next upstream event. Zero disables the limit.
    #[serde(default = "default_upstream_idle_timeout")]
    pub upstream_idle_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
            turn_gate_timeout_secs: default_turn_gate_timeout(),
            upstream_idle_timeout_secs: default_upstream_idle_timeout(),
        }
    }
}

fn default_event_buffer() -> usize {
    16
}

fn default_turn_gate_timeout() -> u64 {
    300
}

fn default_upstream_idle_timeout() -> u64 {
    600
}

/// Session cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry lifetime in seconds. Zero disables the cache.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    3600
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Emit JSON log lines.
    #[serde(default)]
    pub json: bool,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Get the level as a filter directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

fn default_true() -> bool {
    true
}
