// ABOUTME: Database management for the console's SQLite persistence layer
// ABOUTME: Owns the connection pool, linear idempotent migrations, and id generation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Database Management
//!
//! SQLite-backed storage for sessions, messages, profiles, the model
//! catalog, and usage logs. Schema is applied on startup by per-domain
//! `migrate_*` functions using idempotent DDL; all tables use `IF NOT
//! EXISTS` so repeated startups are safe.

mod messages;
mod models;
mod profiles;
mod search;
mod sessions;
mod usage;

pub use messages::MessageRecord;
pub use models::{ModelFilters, ModelRecord, ModelUpsert};
pub use profiles::{ProfileRecord, ProfileUpsert};
pub use search::{SearchFilters, SearchHit};
pub use sessions::{SessionRecord, SessionUpdate};
pub use usage::{ModelUsageSummary, UsageLogRecord};

use crate::errors::{AppError, AppResult};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

/// Database manager for console storage
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection and apply migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or a
    /// migration statement fails
    pub async fn new(database_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::database(format!("Invalid database URL: {e}")))?
            .create_if_missing(true)
            // Cascade/set-null behavior in the schema depends on this pragma
            .foreign_keys(true);

        // An in-memory database exists per connection; a pool of one keeps
        // every query on the same instance
        let pool = if database_url.contains(":memory:") {
            sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await
        } else {
            SqlitePool::connect_with(options).await
        }
        .map_err(|e| AppError::database(format!("Failed to connect: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any DDL statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        // Models first: usage_logs carries a foreign key into the catalog
        self.migrate_models().await?;
        self.migrate_profiles().await?;
        self.migrate_sessions().await?;
        self.migrate_messages().await?;
        self.migrate_usage().await?;
        self.migrate_search().await?;

        Ok(())
    }
}

/// Generate a fresh opaque record id
#[must_use]
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current timestamp in the RFC 3339 format stored in the database
#[must_use]
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
