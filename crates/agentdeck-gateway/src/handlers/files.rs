//! Workspace file browsing.

use super::require_session;
use crate::error::GatewayError;
use crate::server::AppState;
use crate::Result;
use agentdeck_store::{FileContent, FileEntry};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `?path=` relative to the workspace root.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PathQuery {
    pub path: String,
}

/// Response of the directory listing.
#[derive(Debug, Serialize)]
pub struct FileList {
    pub files: Vec<FileEntry>,
    pub path: String,
    pub total: usize,
}

/// `GET /api/sessions/{id}/files`
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<PathQuery>,
) -> Result<Json<FileList>> {
    let session = require_session(&state, &session_id).await?;
    let files = state
        .workspaces
        .list_dir(&session.workspace_path, &query.path)
        .await?;
    Ok(Json(FileList {
        total: files.len(),
        files,
        path: query.path,
    }))
}

/// `GET /api/sessions/{id}/files/content`
pub async fn file_content(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<PathQuery>,
) -> Result<Json<FileContent>> {
    if query.path.trim().is_empty() {
        return Err(GatewayError::InvalidParams("path is required".into()));
    }
    let session = require_session(&state, &session_id).await?;
    let content = state
        .workspaces
        .read_text(&session.workspace_path, &query.path)
        .await?;
    Ok(Json(content))
}

#[cfg(test)]
mod tests {
    use crate::server::testing::TestApp;
    use agentdeck_core::types::SessionId;
    use agentdeck_store::{NewSession, SessionRegistry};
    use axum::http::StatusCode;

    async fn app_with_files() -> TestApp {
        let app = TestApp::new().await;
        let session = app
            .store
            .create(NewSession {
                id: Some(SessionId::new("ws")),
                workspace_name: None,
            })
            .await
            .unwrap();
        let root = session.workspace_path;
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
        std::fs::write(root.join(".env"), "SECRET=1").unwrap();
        std::fs::write(root.join("logo.bin"), [0xff, 0xfe, 0x00, 0x9f]).unwrap();
        app
    }

    #[tokio::test]
    async fn test_list_root() {
        let app = app_with_files().await;
        let (status, body) = app.get("/api/sessions/ws/files").await;
        assert_eq!(status, StatusCode::OK);

        let names: Vec<_> = body["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec![".claude", "src", "logo.bin", "README.md"]);
        assert_eq!(body["total"], 4);
        assert_eq!(body["files"][1]["type"], "directory");
    }

    #[tokio::test]
    async fn test_list_subdirectory() {
        let app = app_with_files().await;
        let (status, body) = app.get("/api/sessions/ws/files?path=src").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["path"], "src");
        assert_eq!(body["files"][0]["path"], "src/main.rs");
        assert_eq!(body["files"][0]["type"], "file");
    }

    #[tokio::test]
    async fn test_traversal_is_forbidden() {
        let app = app_with_files().await;
        let (status, body) = app.get("/api/sessions/ws/files?path=../..").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "forbidden");
    }

    #[tokio::test]
    async fn test_read_text_file() {
        let app = app_with_files().await;
        let (status, body) = app
            .get("/api/sessions/ws/files/content?path=src/main.rs")
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["content"], "fn main() {}\n");
        assert_eq!(body["size"], 13);
    }

    #[tokio::test]
    async fn test_read_errors() {
        let app = app_with_files().await;

        let (status, _) = app.get("/api/sessions/ws/files/content?path=logo.bin").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.get("/api/sessions/ws/files/content?path=missing.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.get("/api/sessions/ws/files/content").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.get("/api/sessions/nope/files").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
