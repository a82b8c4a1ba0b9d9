// ABOUTME: Database operations for the usage ledger
// ABOUTME: One record per completed streaming turn with cost computed from catalog prices
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{new_record_id, Database};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sqlx::Row;

/// Database representation of a usage log entry, joined with catalog names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLogRecord {
    /// Unique record ID
    pub id: String,
    /// Session that produced this usage
    pub session_id: String,
    /// Profile in effect, if any
    pub profile_id: Option<i64>,
    /// Catalog model, if the model was known
    pub model_id: Option<String>,
    /// Catalog display name (join)
    pub model_name: Option<String>,
    /// Upstream model identifier (join)
    pub openrouter_id: Option<String>,
    /// Prompt token count
    pub prompt_tokens: i64,
    /// Completion token count
    pub completion_tokens: i64,
    /// Total tokens (always prompt + completion, recomputed)
    pub total_tokens: i64,
    /// Computed cost in USD
    pub cost_usd: f64,
    /// When the record was written (ISO 8601)
    pub created_at: String,
}

/// Aggregated usage for one model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelUsageSummary {
    pub model_id: Option<String>,
    pub model_name: Option<String>,
    pub openrouter_id: Option<String>,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub cost_usd: f64,
}

impl Database {
    /// Create usage ledger table
    pub(super) async fn migrate_usage(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS usage_logs (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                profile_id INTEGER REFERENCES profiles(id) ON DELETE SET NULL,
                model_id TEXT REFERENCES models(id) ON DELETE SET NULL,
                prompt_tokens INTEGER NOT NULL DEFAULT 0,
                completion_tokens INTEGER NOT NULL DEFAULT 0,
                total_tokens INTEGER NOT NULL DEFAULT 0,
                cost_usd REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_usage_logs_session_created ON usage_logs(session_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_usage_logs_model_created ON usage_logs(model_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record usage for one completed streaming turn
    ///
    /// Total tokens are recomputed as prompt + completion rather than trusted
    /// from upstream. Cost uses the catalog's per-million-token prices and is
    /// zero when the model or its prices are unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn insert_usage_log(
        &self,
        session_id: &str,
        model_id: Option<&str>,
        profile_id: Option<i64>,
        prompt_tokens: i64,
        completion_tokens: i64,
    ) -> AppResult<String> {
        let prompt_tokens = prompt_tokens.max(0);
        let completion_tokens = completion_tokens.max(0);
        let total_tokens = prompt_tokens + completion_tokens;

        let (pricing_prompt, pricing_completion) = match model_id {
            Some(id) => self.get_model_pricing(id).await?.unwrap_or((0.0, 0.0)),
            None => (0.0, 0.0),
        };

        #[allow(clippy::cast_precision_loss)]
        let cost_usd = (prompt_tokens as f64 * pricing_prompt
            + completion_tokens as f64 * pricing_completion)
            / 1_000_000.0;

        let id = new_record_id();
        sqlx::query(
            r"
            INSERT INTO usage_logs (id, session_id, profile_id, model_id, prompt_tokens, completion_tokens, total_tokens, cost_usd, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(&id)
        .bind(session_id)
        .bind(profile_id)
        .bind(model_id)
        .bind(prompt_tokens)
        .bind(completion_tokens)
        .bind(total_tokens)
        .bind(cost_usd)
        .bind(super::now_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to insert usage log: {e}")))?;

        Ok(id)
    }

    /// Usage logs for a session, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_usage_by_session(&self, session_id: &str) -> AppResult<Vec<UsageLogRecord>> {
        let rows = sqlx::query(
            r"
            SELECT ul.id, ul.session_id, ul.profile_id, ul.model_id,
                   m.name AS model_name, m.openrouter_id,
                   ul.prompt_tokens, ul.completion_tokens, ul.total_tokens, ul.cost_usd, ul.created_at
            FROM usage_logs ul
            LEFT JOIN models m ON ul.model_id = m.id
            WHERE ul.session_id = $1
            ORDER BY ul.created_at DESC
            ",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list usage logs: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| UsageLogRecord {
                id: r.get("id"),
                session_id: r.get("session_id"),
                profile_id: r.get("profile_id"),
                model_id: r.get("model_id"),
                model_name: r.get("model_name"),
                openrouter_id: r.get("openrouter_id"),
                prompt_tokens: r.get("prompt_tokens"),
                completion_tokens: r.get("completion_tokens"),
                total_tokens: r.get("total_tokens"),
                cost_usd: r.get("cost_usd"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    /// Aggregate usage per model, highest cost first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn aggregate_usage_by_model(&self) -> AppResult<Vec<ModelUsageSummary>> {
        let rows = sqlx::query(
            r"
            SELECT ul.model_id, m.name AS model_name, m.openrouter_id,
                   SUM(ul.prompt_tokens) AS prompt_tokens,
                   SUM(ul.completion_tokens) AS completion_tokens,
                   SUM(ul.total_tokens) AS total_tokens,
                   SUM(ul.cost_usd) AS cost_usd
            FROM usage_logs ul
            LEFT JOIN models m ON ul.model_id = m.id
            GROUP BY ul.model_id
            ORDER BY cost_usd DESC, total_tokens DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to aggregate usage: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| ModelUsageSummary {
                model_id: r.get("model_id"),
                model_name: r.get("model_name"),
                openrouter_id: r.get("openrouter_id"),
                prompt_tokens: r.get("prompt_tokens"),
                completion_tokens: r.get("completion_tokens"),
                total_tokens: r.get("total_tokens"),
                cost_usd: r.get("cost_usd"),
            })
            .collect())
    }

    /// Fetch one usage log by id (used by the manual-insert endpoint)
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_usage_log(&self, usage_id: &str) -> AppResult<Option<UsageLogRecord>> {
        let row = sqlx::query(
            r"
            SELECT ul.id, ul.session_id, ul.profile_id, ul.model_id,
                   m.name AS model_name, m.openrouter_id,
                   ul.prompt_tokens, ul.completion_tokens, ul.total_tokens, ul.cost_usd, ul.created_at
            FROM usage_logs ul
            LEFT JOIN models m ON ul.model_id = m.id
            WHERE ul.id = $1
            ",
        )
        .bind(usage_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get usage log: {e}")))?;

        Ok(row.map(|r| UsageLogRecord {
            id: r.get("id"),
            session_id: r.get("session_id"),
            profile_id: r.get("profile_id"),
            model_id: r.get("model_id"),
            model_name: r.get("model_name"),
            openrouter_id: r.get("openrouter_id"),
            prompt_tokens: r.get("prompt_tokens"),
            completion_tokens: r.get("completion_tokens"),
            total_tokens: r.get("total_tokens"),
            cost_usd: r.get("cost_usd"),
            created_at: r.get("created_at"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::create_test_db;
    use super::super::ModelUpsert;
    use super::*;
    use crate::models::SessionType;

    async fn seed_model(db: &Database, prompt: f64, completion: f64) -> String {
        db.upsert_models(&[ModelUpsert {
            openrouter_id: "openai/gpt-x".into(),
            name: "GPT X".into(),
            context_length: None,
            pricing_prompt: Some(prompt),
            pricing_completion: Some(completion),
            is_reasoning: false,
        }])
        .await
        .unwrap();
        db.find_model("openai/gpt-x").await.unwrap().unwrap().id
    }

    #[tokio::test]
    async fn test_cost_uses_per_million_prices() {
        let db = create_test_db().await.unwrap();
        let session = db
            .create_session(SessionType::Chat, None, None)
            .await
            .unwrap();
        let model_id = seed_model(&db, 2.0, 6.0).await;

        let usage_id = db
            .insert_usage_log(&session.id, Some(&model_id), None, 1000, 500)
            .await
            .unwrap();

        let record = db.get_usage_log(&usage_id).await.unwrap().unwrap();
        assert_eq!(record.total_tokens, 1500);
        // 1000*2.0/1e6 + 500*6.0/1e6
        assert!((record.cost_usd - 0.005).abs() < 1e-9);
        assert_eq!(record.model_name.as_deref(), Some("GPT X"));
    }

    #[tokio::test]
    async fn test_unknown_model_costs_zero() {
        let db = create_test_db().await.unwrap();
        let session = db
            .create_session(SessionType::Chat, None, None)
            .await
            .unwrap();

        let usage_id = db
            .insert_usage_log(&session.id, None, None, 10, 5)
            .await
            .unwrap();
        let record = db.get_usage_log(&usage_id).await.unwrap().unwrap();
        assert_eq!(record.cost_usd, 0.0);
        assert_eq!(record.total_tokens, 15);
    }

    #[tokio::test]
    async fn test_aggregate_by_model() {
        let db = create_test_db().await.unwrap();
        let session = db
            .create_session(SessionType::Chat, None, None)
            .await
            .unwrap();
        let model_id = seed_model(&db, 1.0, 1.0).await;

        db.insert_usage_log(&session.id, Some(&model_id), None, 100, 50)
            .await
            .unwrap();
        db.insert_usage_log(&session.id, Some(&model_id), None, 200, 100)
            .await
            .unwrap();

        let summary = db.aggregate_usage_by_model().await.unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].prompt_tokens, 300);
        assert_eq!(summary[0].completion_tokens, 150);
        assert_eq!(summary[0].total_tokens, 450);
    }

    #[tokio::test]
    async fn test_session_delete_cascades_usage() {
        let db = create_test_db().await.unwrap();
        let session = db
            .create_session(SessionType::Chat, None, None)
            .await
            .unwrap();
        db.insert_usage_log(&session.id, None, None, 1, 1)
            .await
            .unwrap();

        db.delete_session(&session.id).await.unwrap();
        assert!(db
            .list_usage_by_session(&session.id)
            .await
            .unwrap()
            .is_empty());
    }
}
