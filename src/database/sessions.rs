// ABOUTME: Database operations for console sessions
// ABOUTME: Handles session CRUD with cascade semantics into messages and usage logs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{new_record_id, Database};
use crate::errors::{AppError, AppResult};
use crate::models::SessionType;
use serde::{Deserialize, Serialize};
use sqlx::Row;

/// Database representation of a console session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique session ID
    pub id: String,
    /// Session kind (chat, code, documents, playground)
    pub session_type: String,
    /// Optional title
    pub title: Option<String>,
    /// Default profile for this session, if any
    pub profile_id: Option<i64>,
    /// When the session was created (ISO 8601)
    pub created_at: String,
}

/// Partial update for a session; `None` fields are left untouched
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SessionUpdate {
    /// New title
    pub title: Option<String>,
    /// New default profile reference; an explicit JSON null clears it
    #[serde(default, deserialize_with = "present_or_null")]
    pub profile_id: Option<Option<i64>>,
}

/// Distinguish an absent field (outer `None`) from an explicit null
/// (`Some(None)`) so a PATCH can clear the profile reference
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

impl Database {
    /// Create session table
    pub(super) async fn migrate_sessions(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                session_type TEXT NOT NULL CHECK (session_type IN ('chat', 'code', 'documents', 'playground')),
                title TEXT,
                profile_id INTEGER REFERENCES profiles(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_created ON sessions(created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Create a new session
    ///
    /// # Errors
    ///
    /// Returns an error if the referenced profile does not exist or the
    /// database operation fails
    pub async fn create_session(
        &self,
        session_type: SessionType,
        title: Option<&str>,
        profile_id: Option<i64>,
    ) -> AppResult<SessionRecord> {
        let id = new_record_id();
        let now = super::now_rfc3339();

        sqlx::query(
            r"
            INSERT INTO sessions (id, session_type, title, profile_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&id)
        .bind(session_type.as_str())
        .bind(title)
        .bind(profile_id)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create session: {e}")))?;

        Ok(SessionRecord {
            id,
            session_type: session_type.as_str().to_owned(),
            title: title.map(ToOwned::to_owned),
            profile_id,
            created_at: now,
        })
    }

    /// Get a session by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_session(&self, session_id: &str) -> AppResult<Option<SessionRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, session_type, title, profile_id, created_at
            FROM sessions
            WHERE id = $1
            ",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get session: {e}")))?;

        Ok(row.map(|r| SessionRecord {
            id: r.get("id"),
            session_type: r.get("session_type"),
            title: r.get("title"),
            profile_id: r.get("profile_id"),
            created_at: r.get("created_at"),
        }))
    }

    /// List sessions, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_sessions(&self, limit: i64) -> AppResult<Vec<SessionRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, session_type, title, profile_id, created_at
            FROM sessions
            ORDER BY created_at DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list sessions: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| SessionRecord {
                id: r.get("id"),
                session_type: r.get("session_type"),
                title: r.get("title"),
                profile_id: r.get("profile_id"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    /// Apply a partial update to a session
    ///
    /// Returns false when the session does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn update_session(
        &self,
        session_id: &str,
        update: &SessionUpdate,
    ) -> AppResult<bool> {
        let result = match (&update.title, &update.profile_id) {
            // Nothing requested still counts as success against an existing row
            (None, None) => return Ok(self.get_session(session_id).await?.is_some()),
            (Some(title), None) => {
                sqlx::query("UPDATE sessions SET title = $1 WHERE id = $2")
                    .bind(title)
                    .bind(session_id)
                    .execute(&self.pool)
                    .await
            }
            (None, Some(profile_id)) => {
                sqlx::query("UPDATE sessions SET profile_id = $1 WHERE id = $2")
                    .bind(profile_id)
                    .bind(session_id)
                    .execute(&self.pool)
                    .await
            }
            (Some(title), Some(profile_id)) => {
                sqlx::query("UPDATE sessions SET title = $1, profile_id = $2 WHERE id = $3")
                    .bind(title)
                    .bind(profile_id)
                    .bind(session_id)
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| AppError::database(format!("Failed to update session: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a session; messages and usage logs cascade
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn delete_session(&self, session_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete session: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::create_test_db;
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_session() {
        let db = create_test_db().await.unwrap();

        let created = db
            .create_session(SessionType::Chat, Some("First"), None)
            .await
            .unwrap();
        let fetched = db.get_session(&created.id).await.unwrap().unwrap();

        assert_eq!(fetched.session_type, "chat");
        assert_eq!(fetched.title.as_deref(), Some("First"));
        assert!(fetched.profile_id.is_none());
    }

    #[tokio::test]
    async fn test_update_session_title_only() {
        let db = create_test_db().await.unwrap();
        let session = db
            .create_session(SessionType::Code, None, None)
            .await
            .unwrap();

        let updated = db
            .update_session(
                &session.id,
                &SessionUpdate {
                    title: Some("Renamed".into()),
                    profile_id: None,
                },
            )
            .await
            .unwrap();
        assert!(updated);

        let fetched = db.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.title.as_deref(), Some("Renamed"));
    }

    #[tokio::test]
    async fn test_update_missing_session_returns_false() {
        let db = create_test_db().await.unwrap();
        let updated = db
            .update_session(
                "missing",
                &SessionUpdate {
                    title: Some("x".into()),
                    profile_id: None,
                },
            )
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_delete_session() {
        let db = create_test_db().await.unwrap();
        let session = db
            .create_session(SessionType::Playground, None, None)
            .await
            .unwrap();

        assert!(db.delete_session(&session.id).await.unwrap());
        assert!(db.get_session(&session.id).await.unwrap().is_none());
        assert!(!db.delete_session(&session.id).await.unwrap());
    }
}
