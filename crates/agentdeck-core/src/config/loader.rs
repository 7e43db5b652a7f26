//! Configuration loading and persistence.

use super::Config;
use crate::error::ConfigError;
use crate::paths;
use std::fs;
use std::path::{Path, PathBuf};

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from the default path, falling back to defaults
    /// when no file exists yet.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => paths::config_file()?,
        };
        match Self::load(&path) {
            Err(ConfigError::NotFound(_)) => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 doesn't have a serializer, so we use serde_json with pretty print
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Resolved SQLite database path.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => paths::database_file(),
        }
    }

    /// Resolved workspace root.
    pub fn workspace_root(&self) -> Result<PathBuf, ConfigError> {
        match &self.workspace.root {
            Some(root) => Ok(root.clone()),
            None => paths::workspaces_dir(),
        }
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("Server port cannot be 0".to_string());
        }

        if self.server.host.trim().is_empty() {
            errors.push("Server host cannot be empty".to_string());
        }

        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be at least 1".to_string());
        }

        if self.workspace.max_sessions == 0 {
            errors.push("workspace.max_sessions must be at least 1".to_string());
        }

        if self.relay.event_buffer == 0 {
            errors.push("relay.event_buffer must be at least 1".to_string());
        }

        if self.agent.replay_file.is_none() && self.agent.command.trim().is_empty() {
            errors.push("agent.command cannot be empty".to_string());
        }

        if let Some(model) = &self.agent.model {
            if model.trim().is_empty() {
                errors.push("agent.model cannot be an empty string".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}
