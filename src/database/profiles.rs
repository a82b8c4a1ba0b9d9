// ABOUTME: Database operations for named generation profiles
// ABOUTME: Profiles carry system prompt, temperature, max-token, and preset defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::Database;
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sqlx::Row;

/// Database representation of a generation profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Profile ID
    pub id: i64,
    /// Display name
    pub name: String,
    /// Optional system prompt injected ahead of conversation history
    pub system_prompt: Option<String>,
    /// Default sampling temperature
    pub temperature: f64,
    /// Default max-token budget
    pub max_tokens: i64,
    /// Optional OpenRouter routing preset tag
    pub openrouter_preset: Option<String>,
}

/// Field set accepted on profile create and update
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfileUpsert {
    pub name: String,
    pub system_prompt: Option<String>,
    pub temperature: f64,
    pub max_tokens: i64,
    pub openrouter_preset: Option<String>,
}

impl Database {
    /// Create profile table
    pub(super) async fn migrate_profiles(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                system_prompt TEXT,
                temperature REAL NOT NULL DEFAULT 0.7,
                max_tokens INTEGER NOT NULL DEFAULT 2048,
                openrouter_preset TEXT,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create a new profile
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn create_profile(&self, profile: &ProfileUpsert) -> AppResult<ProfileRecord> {
        let result = sqlx::query(
            r"
            INSERT INTO profiles (name, system_prompt, temperature, max_tokens, openrouter_preset)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&profile.name)
        .bind(&profile.system_prompt)
        .bind(profile.temperature)
        .bind(profile.max_tokens)
        .bind(&profile.openrouter_preset)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create profile: {e}")))?;

        Ok(ProfileRecord {
            id: result.last_insert_rowid(),
            name: profile.name.clone(),
            system_prompt: profile.system_prompt.clone(),
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
            openrouter_preset: profile.openrouter_preset.clone(),
        })
    }

    /// Get a profile by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_profile(&self, profile_id: i64) -> AppResult<Option<ProfileRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, name, system_prompt, temperature, max_tokens, openrouter_preset
            FROM profiles
            WHERE id = $1
            ",
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get profile: {e}")))?;

        Ok(row.map(|r| ProfileRecord {
            id: r.get("id"),
            name: r.get("name"),
            system_prompt: r.get("system_prompt"),
            temperature: r.get("temperature"),
            max_tokens: r.get("max_tokens"),
            openrouter_preset: r.get("openrouter_preset"),
        }))
    }

    /// List profiles, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_profiles(&self) -> AppResult<Vec<ProfileRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, name, system_prompt, temperature, max_tokens, openrouter_preset
            FROM profiles
            ORDER BY id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list profiles: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| ProfileRecord {
                id: r.get("id"),
                name: r.get("name"),
                system_prompt: r.get("system_prompt"),
                temperature: r.get("temperature"),
                max_tokens: r.get("max_tokens"),
                openrouter_preset: r.get("openrouter_preset"),
            })
            .collect())
    }

    /// Replace a profile's fields
    ///
    /// Returns false when the profile does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn update_profile(
        &self,
        profile_id: i64,
        profile: &ProfileUpsert,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE profiles
            SET name = $1, system_prompt = $2, temperature = $3, max_tokens = $4, openrouter_preset = $5
            WHERE id = $6
            ",
        )
        .bind(&profile.name)
        .bind(&profile.system_prompt)
        .bind(profile.temperature)
        .bind(profile.max_tokens)
        .bind(&profile.openrouter_preset)
        .bind(profile_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update profile: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a profile; sessions referencing it fall back to no profile
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn delete_profile(&self, profile_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(profile_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete profile: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}
