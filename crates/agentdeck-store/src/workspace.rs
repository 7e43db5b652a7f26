//! Per-session workspace directories.
//!
//! Each session owns one directory under the workspace root. The upstream
//! agent runs with that directory as its working directory, and the file
//! browser reads from it through [`WorkspaceStore::resolve`], which refuses
//! any path that would leave the workspace.

use crate::{Result, StoreError};
use agentdeck_core::error::SecurityError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Largest file the content endpoint will return.
pub const MAX_PREVIEW_BYTES: u64 = 1024 * 1024;

/// Names never shown by the file browser.
const IGNORED_NAMES: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "__pycache__",
    "node_modules",
    ".DS_Store",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    "venv",
    ".venv",
    "env",
    ".env",
    "dist",
    "build",
    "target",
];

/// Hidden names the file browser still shows.
const VISIBLE_DOTFILES: &[&str] = &[".claude", ".gitignore", ".dockerignore"];

const SETTINGS_FILE: &str = "settings.local.json";

const README: &str = "# AgentDeck Workspace

This workspace is managed by AgentDeck. The agent runs with this directory
as its working directory.

## Configuration

Agent settings live in the `.claude/` directory.
";

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

/// One entry in a directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name.
    pub name: String,

    /// Path relative to the workspace root.
    pub path: String,

    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: FileKind,

    /// Size in bytes, for files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Last modification time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

/// Text content of a workspace file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContent {
    /// Requested path.
    pub path: String,

    /// UTF-8 content.
    pub content: String,

    /// Size in bytes.
    pub size: u64,
}

/// Manages workspace directories under a single root.
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    root: PathBuf,
}

impl WorkspaceStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a session's workspace lives in.
    pub fn path_for(&self, session_id: &str, workspace_name: Option<&str>) -> PathBuf {
        self.root.join(workspace_name.unwrap_or(session_id))
    }

    /// Create and bootstrap a workspace directory.
    pub async fn create(&self, session_id: &str, workspace_name: Option<&str>) -> Result<PathBuf> {
        let name = workspace_name.unwrap_or(session_id);
        validate_name(name)?;

        let path = self.path_for(session_id, workspace_name);
        if tokio::fs::try_exists(&path).await? {
            return Err(StoreError::WorkspaceExists(name.to_string()));
        }

        let claude_dir = path.join(".claude");
        tokio::fs::create_dir_all(claude_dir.join("commands")).await?;

        let settings = serde_json::json!({
            "permission_mode": "acceptEdits",
            "auto_approval": { "enabled": true, "max_turns": 10 },
            "workspace": { "enabled": true, "auto_save": true },
        });
        tokio::fs::write(
            claude_dir.join(SETTINGS_FILE),
            serde_json::to_string_pretty(&settings)?,
        )
        .await?;
        tokio::fs::write(path.join("README.md"), README).await?;

        info!("Created workspace {}", path.display());
        Ok(path)
    }

    /// Remove a workspace directory. Returns false if it did not exist.
    pub async fn delete(&self, path: &Path) -> Result<bool> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(false);
        }
        tokio::fs::remove_dir_all(path).await?;
        debug!("Deleted workspace {}", path.display());
        Ok(true)
    }

    /// Resolve a client-supplied relative path inside a workspace.
    ///
    /// A leading `/` is treated as the workspace root. The result is checked
    /// against the canonical workspace so symlinks cannot escape it either.
    pub fn resolve(&self, workspace: &Path, relative: &str) -> Result<PathBuf> {
        let base = workspace.canonicalize()?;
        let trimmed = relative.trim_start_matches('/');

        let mut target = base.clone();
        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(part) => target.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !target.pop() || !target.starts_with(&base) {
                        return Err(traversal(trimmed, &base));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(SecurityError::AbsolutePathNotAllowed.into());
                }
            }
        }

        if target.exists() {
            target = target.canonicalize()?;
        }
        if !target.starts_with(&base) {
            return Err(traversal(trimmed, &base));
        }
        Ok(target)
    }

    /// List a directory, directories first, then by case-insensitive name.
    pub async fn list_dir(&self, workspace: &Path, relative: &str) -> Result<Vec<FileEntry>> {
        let base = workspace.canonicalize()?;
        let target = self.resolve(workspace, relative)?;

        if !tokio::fs::try_exists(&target).await? {
            return Err(StoreError::PathNotFound(relative.to_string()));
        }
        if !tokio::fs::metadata(&target).await?.is_dir() {
            return Err(StoreError::NotADirectory(relative.to_string()));
        }

        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&target).await?;
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name().to_string_lossy().into_owned();
            if is_ignored(&name) {
                continue;
            }

            // Entries that vanish or cannot be stat'ed are skipped.
            let Ok(meta) = item.metadata().await else {
                continue;
            };

            let path = item
                .path()
                .strip_prefix(&base)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| name.clone());

            entries.push(FileEntry {
                name,
                path,
                kind: if meta.is_dir() {
                    FileKind::Directory
                } else {
                    FileKind::File
                },
                size: meta.is_file().then(|| meta.len()),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        entries.sort_by(|a, b| {
            (a.kind != FileKind::Directory, a.name.to_lowercase())
                .cmp(&(b.kind != FileKind::Directory, b.name.to_lowercase()))
        });
        Ok(entries)
    }

    /// Read a workspace file as UTF-8 text.
    pub async fn read_text(&self, workspace: &Path, relative: &str) -> Result<FileContent> {
        let target = self.resolve(workspace, relative)?;

        if !tokio::fs::try_exists(&target).await? {
            return Err(StoreError::PathNotFound(relative.to_string()));
        }
        let meta = tokio::fs::metadata(&target).await?;
        if !meta.is_file() {
            return Err(StoreError::NotAFile(relative.to_string()));
        }
        if meta.len() > MAX_PREVIEW_BYTES {
            return Err(StoreError::FileTooLarge {
                size: meta.len(),
                max: MAX_PREVIEW_BYTES,
            });
        }

        let bytes = tokio::fs::read(&target).await?;
        let content =
            String::from_utf8(bytes).map_err(|_| StoreError::BinaryFile(relative.to_string()))?;

        Ok(FileContent {
            path: relative.to_string(),
            content,
            size: meta.len(),
        })
    }
}

fn validate_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(StoreError::InvalidInput(format!(
            "invalid workspace name: {:?}",
            name
        ))),
    }
}

fn is_ignored(name: &str) -> bool {
    if IGNORED_NAMES.contains(&name) {
        return true;
    }
    name.starts_with('.') && !VISIBLE_DOTFILES.contains(&name)
}

fn traversal(attempted: &str, workspace: &Path) -> StoreError {
    SecurityError::PathTraversal {
        attempted: PathBuf::from(attempted),
        workspace: workspace.to_path_buf(),
    }
    .into()
}
