// ABOUTME: Full-text search over message content using SQLite's FTS5 extension
// ABOUTME: The index is an external-content table kept in sync by triggers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::Database;
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sqlx::Row;

/// Optional filters applied on top of the FTS match
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SearchFilters {
    /// Restrict to one session type
    pub session_type: Option<String>,
    /// Inclusive lower bound on message creation time (ISO 8601)
    pub date_from: Option<String>,
    /// Inclusive upper bound on message creation time (ISO 8601)
    pub date_to: Option<String>,
    /// Page size
    pub limit: i64,
    /// Page offset
    pub offset: i64,
}

/// One ranked search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Matching message ID
    pub message_id: String,
    /// Owning session
    pub session_id: String,
    /// Owning session's type
    pub session_type: String,
    /// Message role
    pub role: String,
    /// Highlighted extract around the match
    pub snippet: String,
    /// Message creation time
    pub created_at: String,
}

impl Database {
    /// Create the FTS index and its synchronization triggers
    ///
    /// Messages are immutable once written, so insert and delete triggers
    /// are sufficient.
    pub(super) async fn migrate_search(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
                content,
                content='messages',
                content_rowid='rowid'
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TRIGGER IF NOT EXISTS messages_fts_insert AFTER INSERT ON messages BEGIN
                INSERT INTO messages_fts(rowid, content) VALUES (new.rowid, new.content);
            END
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TRIGGER IF NOT EXISTS messages_fts_delete AFTER DELETE ON messages BEGIN
                INSERT INTO messages_fts(messages_fts, rowid, content)
                VALUES ('delete', old.rowid, old.content);
            END
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Search message content with FTS5 query syntax
    ///
    /// Supports keywords, quoted phrases, `term*` prefix matching, and
    /// `-term` exclusion. Results are ranked by bm25 (best match first).
    ///
    /// # Errors
    ///
    /// Returns invalid-input for malformed FTS query syntax, or a database
    /// error if the operation fails
    pub async fn search_messages(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> AppResult<Vec<SearchHit>> {
        let rows = sqlx::query(
            r"
            SELECT m.id, m.session_id, m.role, m.created_at, s.session_type,
                   snippet(messages_fts, 0, '<b>', '</b>', '…', 12) AS snippet
            FROM messages_fts
            JOIN messages m ON m.rowid = messages_fts.rowid
            JOIN sessions s ON s.id = m.session_id
            WHERE messages_fts MATCH $1
              AND ($2 IS NULL OR s.session_type = $2)
              AND ($3 IS NULL OR m.created_at >= $3)
              AND ($4 IS NULL OR m.created_at <= $4)
            ORDER BY bm25(messages_fts) ASC, m.created_at DESC
            LIMIT $5 OFFSET $6
            ",
        )
        .bind(query)
        .bind(&filters.session_type)
        .bind(&filters.date_from)
        .bind(&filters.date_to)
        .bind(filters.limit)
        .bind(filters.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| match &e {
            // FTS5 reports bad query syntax as a database error; surface it
            // as a client problem instead
            sqlx::Error::Database(db_err) if db_err.message().contains("fts5") => {
                AppError::invalid_input(format!("Invalid search query: {}", db_err.message()))
            }
            _ => AppError::database(format!("Search failed: {e}")),
        })?;

        Ok(rows
            .into_iter()
            .map(|r| SearchHit {
                message_id: r.get("id"),
                session_id: r.get("session_id"),
                session_type: r.get("session_type"),
                role: r.get("role"),
                snippet: r.get("snippet"),
                created_at: r.get("created_at"),
            })
            .collect())
    }
}
