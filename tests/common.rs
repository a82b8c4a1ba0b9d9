// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides common database, configuration, and resource builders
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

//! Shared test utilities for `openrouter_console`
//!
//! Common setup functions to reduce duplication across integration tests.
//! Every test gets an isolated in-memory SQLite database.

use openrouter_console::config::environment::{
    DatabaseConfig, DatabaseUrl, Environment, OpenRouterConfig, ServerConfig, StorageConfig,
};
use openrouter_console::database::Database;
use openrouter_console::resources::ServerResources;
use std::sync::{Arc, Once};
use tempfile::TempDir;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Test configuration backed by in-memory storage and throwaway dirs
///
/// No upstream credential is configured unless `api_key` is given, so
/// streaming endpoints fail fast without network access.
pub fn test_config(api_key: Option<&str>, storage_root: &TempDir) -> ServerConfig {
    ServerConfig {
        http_port: 0,
        environment: Environment::Testing,
        database: DatabaseConfig {
            url: DatabaseUrl::Memory,
        },
        openrouter: OpenRouterConfig {
            // Unroutable loopback port so accidental network calls fail fast
            base_url: "http://127.0.0.1:9".into(),
            api_key: api_key.map(ToOwned::to_owned),
            http_referer: "http://localhost:5173".into(),
            x_title: "Test Console".into(),
            timeout_secs: 1,
        },
        cors_origins: vec!["http://localhost:5173".into()],
        storage: StorageConfig {
            uploads_dir: storage_root.path().join("uploads"),
            backup_dir: storage_root.path().join("backups"),
        },
    }
}

/// Standard test database setup
pub async fn create_test_database() -> Database {
    init_test_logging();
    Database::new("sqlite::memory:").await.unwrap()
}

/// Standard resource container for router tests
///
/// Returns the storage root alongside the resources; dropping it removes
/// the uploads/backups directories, so keep it alive for the test's
/// duration.
pub async fn create_test_resources() -> (Arc<ServerResources>, TempDir) {
    create_test_resources_with_key(None).await
}

/// Resource container with an upstream credential configured
pub async fn create_test_resources_with_key(
    api_key: Option<&str>,
) -> (Arc<ServerResources>, TempDir) {
    init_test_logging();
    let storage_root = TempDir::new().unwrap();
    let config = test_config(api_key, &storage_root);
    let database = create_test_database().await;
    let resources = Arc::new(ServerResources::new(database, config).await.unwrap());
    (resources, storage_root)
}
