// ABOUTME: Admin routes for database backup and restore
// ABOUTME: Backups are timestamped file copies; restore validates before swapping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::constants::rate_limits;
use crate::errors::{AppError, AppResult};
use crate::middleware::rate_limit::{enforce, RateLimitScope};
use crate::resources::ServerResources;
use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Row};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// SQLite file magic prefix
const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

/// Metadata for one backup file
#[derive(Debug, Serialize, Deserialize)]
pub struct BackupInfo {
    pub filename: String,
    pub size_bytes: u64,
    pub modified_at: String,
}

/// Admin route handlers
pub struct AdminRoutes;

impl AdminRoutes {
    /// Create all admin routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        let restore_limited = Router::new()
            .route("/api/admin/restore", post(Self::restore_backup))
            .route_layer(axum::middleware::from_fn_with_state(
                RateLimitScope {
                    limiter: resources.rate_limiter.clone(),
                    scope: "admin_restore",
                    preset: rate_limits::UPLOAD,
                },
                enforce,
            ));

        Router::new()
            .route("/api/admin/backup", get(Self::download_backup))
            .route("/api/admin/backups", get(Self::list_backups))
            .route_layer(axum::middleware::from_fn_with_state(
                RateLimitScope {
                    limiter: resources.rate_limiter.clone(),
                    scope: "admin",
                    preset: rate_limits::CRUD,
                },
                enforce,
            ))
            .merge(restore_limited)
            .with_state(resources)
    }

    /// Create and download a timestamped backup of the database file
    async fn download_backup(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Response, AppError> {
        let db_path = database_file(&resources)?;
        if !db_path.exists() {
            return Err(AppError::not_found("Database file"));
        }

        let backup_dir = ensure_backup_dir(&resources).await?;
        let timestamp = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S");
        let backup_name = format!("console_backup_{timestamp}.db");
        let backup_path = backup_dir.join(&backup_name);

        tokio::fs::copy(&db_path, &backup_path)
            .await
            .map_err(|e| AppError::storage(format!("Backup failed: {e}")))?;

        let bytes = tokio::fs::read(&backup_path)
            .await
            .map_err(|e| AppError::storage(format!("Failed to read backup: {e}")))?;

        info!(
            backup_file = %backup_name,
            size_bytes = bytes.len(),
            "database backup created"
        );

        Ok((
            [
                (header::CONTENT_TYPE, "application/x-sqlite3".to_owned()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{backup_name}\""),
                ),
            ],
            bytes,
        )
            .into_response())
    }

    /// Restore the database from an uploaded backup file
    ///
    /// The upload is validated (SQLite header and `PRAGMA integrity_check`)
    /// and a safety backup of the current database is taken before the
    /// swap. A server restart is recommended afterwards so every pooled
    /// connection sees the restored file.
    async fn restore_backup(
        State(resources): State<Arc<ServerResources>>,
        mut multipart: Multipart,
    ) -> Result<Response, AppError> {
        let db_path = database_file(&resources)?;
        let backup_dir = ensure_backup_dir(&resources).await?;

        let field = multipart
            .next_field()
            .await
            .map_err(|e| AppError::invalid_input(format!("Malformed multipart body: {e}")))?
            .ok_or_else(|| AppError::invalid_input("No file field in upload"))?;

        let filename = field.file_name().unwrap_or("restore.db").to_owned();
        if !filename.ends_with(".db") {
            return Err(AppError::invalid_input(
                "Invalid file type; must be a .db file",
            ));
        }

        let content = field
            .bytes()
            .await
            .map_err(|e| AppError::invalid_input(format!("Failed to read upload: {e}")))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let temp_path = backup_dir.join(format!("temp_restore_{timestamp}.db"));
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| AppError::storage(format!("Failed to stage restore file: {e}")))?;

        let validation = validate_sqlite_file(&temp_path, &content).await;
        if let Err(e) = validation {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }

        // Safety backup of the current database before replacing it
        let safety_name = format!("console_backup_before_restore_{timestamp}.db");
        if db_path.exists() {
            tokio::fs::copy(&db_path, backup_dir.join(&safety_name))
                .await
                .map_err(|e| AppError::storage(format!("Safety backup failed: {e}")))?;
            info!(backup_file = %safety_name, "created safety backup before restore");
        }

        let swap = tokio::fs::copy(&temp_path, &db_path).await;
        let _ = tokio::fs::remove_file(&temp_path).await;
        swap.map_err(|e| {
            error!("database restore failed: {e}");
            AppError::storage(format!("Restore failed: {e}"))
        })?;

        info!(source_file = %filename, "database restored from backup");

        Ok(Json(json!({
            "message": "Database restored successfully",
            "safety_backup": safety_name,
            "note": "Server restart recommended for changes to take full effect"
        }))
        .into_response())
    }

    /// List available backup files, newest first
    async fn list_backups(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Response, AppError> {
        let backup_dir = ensure_backup_dir(&resources).await?;
        let mut backups = Vec::new();

        let mut entries = tokio::fs::read_dir(&backup_dir)
            .await
            .map_err(|e| AppError::storage(format!("Failed to read backup dir: {e}")))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::storage(format!("Failed to read backup dir: {e}")))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with("console_backup_") || !name.ends_with(".db") {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            backups.push(BackupInfo {
                filename: name,
                size_bytes: metadata.len(),
                modified_at: metadata
                    .modified()
                    .ok()
                    .map(chrono::DateTime::<chrono::Utc>::from)
                    .map_or_else(String::new, |t| t.to_rfc3339()),
            });
        }

        backups.sort_by(|a, b| b.filename.cmp(&a.filename));
        let total = backups.len();
        Ok(Json(json!({
            "backups": backups,
            "total": total,
            "backup_directory": backup_dir.display().to_string(),
        }))
        .into_response())
    }
}

fn database_file(resources: &Arc<ServerResources>) -> AppResult<PathBuf> {
    resources
        .config
        .database
        .url
        .file_path()
        .cloned()
        .ok_or_else(|| {
            AppError::invalid_input("Backup requires a file-backed database, not :memory:")
        })
}

async fn ensure_backup_dir(resources: &Arc<ServerResources>) -> AppResult<PathBuf> {
    let backup_dir = resources.config.storage.backup_dir.clone();
    tokio::fs::create_dir_all(&backup_dir)
        .await
        .map_err(|e| AppError::storage(format!("Failed to create backup dir: {e}")))?;
    Ok(backup_dir)
}

/// Check the staged file really is a healthy SQLite database
async fn validate_sqlite_file(path: &Path, content: &[u8]) -> AppResult<()> {
    if !content.starts_with(SQLITE_MAGIC) {
        return Err(AppError::invalid_input("Not a SQLite database file"));
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .map_err(|e| AppError::invalid_input(format!("Unusable database file: {e}")))?
        .read_only(true);

    let mut connection = options.connect().await.map_err(|e| {
        warn!("restore validation failed to open file: {e}");
        AppError::invalid_input("Invalid SQLite database file")
    })?;

    let row = sqlx::query("PRAGMA integrity_check")
        .fetch_one(&mut connection)
        .await
        .map_err(|_| AppError::invalid_input("Invalid SQLite database file"))?;
    let result: String = row.get(0);

    if result != "ok" {
        return Err(AppError::invalid_input(format!(
            "Database failed integrity check: {result}"
        )));
    }

    Ok(())
}
