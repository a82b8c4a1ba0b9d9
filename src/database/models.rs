// ABOUTME: Database operations for the mirrored OpenRouter model catalog
// ABOUTME: Sync is an upsert keyed on the upstream id so local ids survive re-sync
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{new_record_id, Database};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sqlx::Row;

/// Database representation of a catalog model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Stable local ID; preserved across re-sync
    pub id: String,
    /// Upstream OpenRouter model identifier (unique)
    pub openrouter_id: String,
    /// Display name
    pub name: String,
    /// Context-length limit, when published
    pub context_length: Option<i64>,
    /// Prompt price in USD per million tokens
    pub pricing_prompt: Option<f64>,
    /// Completion price in USD per million tokens
    pub pricing_completion: Option<f64>,
    /// Whether the model advertises reasoning capability
    pub is_reasoning: bool,
}

/// One catalog row as produced by the sync operation
#[derive(Debug, Clone)]
pub struct ModelUpsert {
    pub openrouter_id: String,
    pub name: String,
    pub context_length: Option<i64>,
    pub pricing_prompt: Option<f64>,
    pub pricing_completion: Option<f64>,
    pub is_reasoning: bool,
}

/// Optional filters for catalog listing
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelFilters {
    pub reasoning: Option<bool>,
    pub max_price: Option<f64>,
    pub min_context: Option<i64>,
}

impl Database {
    /// Create model catalog table
    pub(super) async fn migrate_models(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS models (
                id TEXT PRIMARY KEY,
                openrouter_id TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                context_length INTEGER,
                pricing_prompt REAL,
                pricing_completion REAL,
                is_reasoning INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Upsert the catalog from a fresh upstream listing
    ///
    /// Keyed on `openrouter_id`; existing local ids are preserved so usage
    /// logs referencing them stay valid across re-sync.
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails
    pub async fn upsert_models(&self, rows: &[ModelUpsert]) -> AppResult<usize> {
        let mut count = 0;
        for model in rows {
            sqlx::query(
                r"
                INSERT INTO models (id, openrouter_id, name, context_length, pricing_prompt, pricing_completion, is_reasoning)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT(openrouter_id) DO UPDATE SET
                    name = excluded.name,
                    context_length = excluded.context_length,
                    pricing_prompt = excluded.pricing_prompt,
                    pricing_completion = excluded.pricing_completion,
                    is_reasoning = excluded.is_reasoning
                ",
            )
            .bind(new_record_id())
            .bind(&model.openrouter_id)
            .bind(&model.name)
            .bind(model.context_length)
            .bind(model.pricing_prompt)
            .bind(model.pricing_completion)
            .bind(i64::from(model.is_reasoning))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to upsert model: {e}")))?;
            count += 1;
        }

        Ok(count)
    }

    /// List catalog models with optional filters, ordered by name
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_models(&self, filters: ModelFilters) -> AppResult<Vec<ModelRecord>> {
        // Absent catalog values pass the price/context filters rather than
        // excluding the model
        let rows = sqlx::query(
            r"
            SELECT id, openrouter_id, name, context_length, pricing_prompt, pricing_completion, is_reasoning
            FROM models
            WHERE ($1 IS NULL OR is_reasoning = $1)
              AND ($2 IS NULL OR context_length IS NULL OR context_length >= $2)
              AND ($3 IS NULL OR ((pricing_prompt IS NULL OR pricing_prompt <= $3)
                   AND (pricing_completion IS NULL OR pricing_completion <= $3)))
            ORDER BY name COLLATE NOCASE ASC
            ",
        )
        .bind(filters.reasoning.map(i64::from))
        .bind(filters.min_context)
        .bind(filters.max_price)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list models: {e}")))?;

        Ok(rows.into_iter().map(model_from_row).collect())
    }

    /// Resolve a catalog model by local id, falling back to the upstream id
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn find_model(&self, model_id: &str) -> AppResult<Option<ModelRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, openrouter_id, name, context_length, pricing_prompt, pricing_completion, is_reasoning
            FROM models
            WHERE id = $1 OR openrouter_id = $1
            ",
        )
        .bind(model_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to find model: {e}")))?;

        Ok(row.map(model_from_row))
    }

    /// Per-million-token prices for a catalog model, when known
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_model_pricing(&self, model_id: &str) -> AppResult<Option<(f64, f64)>> {
        let row = sqlx::query("SELECT pricing_prompt, pricing_completion FROM models WHERE id = $1")
            .bind(model_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get model pricing: {e}")))?;

        Ok(row.map(|r| {
            (
                r.get::<Option<f64>, _>("pricing_prompt").unwrap_or(0.0),
                r.get::<Option<f64>, _>("pricing_completion").unwrap_or(0.0),
            )
        }))
    }
}

fn model_from_row(r: sqlx::sqlite::SqliteRow) -> ModelRecord {
    ModelRecord {
        id: r.get("id"),
        openrouter_id: r.get("openrouter_id"),
        name: r.get("name"),
        context_length: r.get("context_length"),
        pricing_prompt: r.get("pricing_prompt"),
        pricing_completion: r.get("pricing_completion"),
        is_reasoning: r.get::<i64, _>("is_reasoning") != 0,
    }
}
