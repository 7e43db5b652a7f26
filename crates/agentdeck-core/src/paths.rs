//! Path resolution utilities.

use crate::error::ConfigError;
use std::path::PathBuf;

/// Get the AgentDeck base directory (~/.agentdeck).
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::Validation("Could not determine home directory".to_string())
    })?;
    Ok(home.join(".agentdeck"))
}

/// Get the main config file path (~/.agentdeck/agentdeck.json5).
pub fn config_file() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("agentdeck.json5"))
}

/// Get the default database file (~/.agentdeck/agentdeck.db).
pub fn database_file() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("agentdeck.db"))
}

/// Get the default workspace root (~/.agentdeck/workspaces).
pub fn workspaces_dir() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("workspaces"))
}

/// Ensure the base directory exists.
pub fn ensure_dirs() -> Result<(), ConfigError> {
    std::fs::create_dir_all(base_dir()?)?;
    Ok(())
}
