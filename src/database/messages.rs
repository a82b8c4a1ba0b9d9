// ABOUTME: Database operations for the append-only message log
// ABOUTME: Messages are immutable once written and ordered by creation within a session
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{new_record_id, Database};
use crate::errors::{AppError, AppResult};
use crate::models::MessageRole;
use serde::{Deserialize, Serialize};
use sqlx::Row;

/// Database representation of a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique message ID
    pub id: String,
    /// Session this message belongs to
    pub session_id: String,
    /// Role of the message sender (system, user, assistant, tool)
    pub role: String,
    /// Message content
    pub content: String,
    /// When the message was created (ISO 8601)
    pub created_at: String,
}

impl Database {
    /// Create message table
    pub(super) async fn migrate_messages(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                role TEXT NOT NULL CHECK (role IN ('system', 'user', 'assistant', 'tool')),
                content TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session_created ON messages(session_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append a message to a session
    ///
    /// # Errors
    ///
    /// Returns an error if the session does not exist (foreign key) or the
    /// database operation fails
    pub async fn add_message(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
    ) -> AppResult<MessageRecord> {
        let id = new_record_id();
        let now = super::now_rfc3339();

        sqlx::query(
            r"
            INSERT INTO messages (id, session_id, role, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&id)
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to add message: {e}")))?;

        Ok(MessageRecord {
            id,
            session_id: session_id.to_owned(),
            role: role.as_str().to_owned(),
            content: content.to_owned(),
            created_at: now,
        })
    }

    /// Get all messages for a session in chronological order
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_messages(&self, session_id: &str) -> AppResult<Vec<MessageRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, session_id, role, content, created_at
            FROM messages
            WHERE session_id = $1
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list messages: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| MessageRecord {
                id: r.get("id"),
                session_id: r.get("session_id"),
                role: r.get("role"),
                content: r.get("content"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    /// Count messages in a session
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn count_messages(&self, session_id: &str) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM messages WHERE session_id = $1")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count messages: {e}")))?;

        Ok(row.get("count"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::create_test_db;
    use super::*;
    use crate::models::SessionType;

    #[tokio::test]
    async fn test_messages_ordered_by_creation() {
        let db = create_test_db().await.unwrap();
        let session = db
            .create_session(SessionType::Chat, None, None)
            .await
            .unwrap();

        db.add_message(&session.id, MessageRole::User, "first")
            .await
            .unwrap();
        db.add_message(&session.id, MessageRole::Assistant, "second")
            .await
            .unwrap();

        let messages = db.list_messages(&session.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[1].content, "second");
        assert_eq!(messages[1].role, "assistant");
    }

    #[tokio::test]
    async fn test_message_requires_existing_session() {
        let db = create_test_db().await.unwrap();
        let result = db.add_message("nope", MessageRole::User, "hello").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_session_delete_cascades_messages() {
        let db = create_test_db().await.unwrap();
        let session = db
            .create_session(SessionType::Chat, None, None)
            .await
            .unwrap();
        db.add_message(&session.id, MessageRole::User, "hello")
            .await
            .unwrap();

        db.delete_session(&session.id).await.unwrap();
        assert_eq!(db.count_messages(&session.id).await.unwrap(), 0);
    }
}
