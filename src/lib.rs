// ABOUTME: Library root for the OpenRouter console backend
// ABOUTME: Exposes storage, streaming relay, upstream transport, and HTTP route modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # OpenRouter Console Backend
//!
//! A self-hosted console backend that proxies chat completions to
//! OpenRouter, persists conversation state in SQLite, and exposes CRUD
//! endpoints for sessions, messages, profiles, the model catalog, and
//! usage accounting.
//!
//! The core subsystem is the streaming relay pipeline: the [`streaming`]
//! module composes the [`llm`] upstream transport and a delta parser into
//! the SSE event sequence delivered to clients, with exactly-once
//! persistence of the final assistant turn and usage record.
//!
//! ## Example
//!
//! ```rust,no_run
//! use openrouter_console::config::environment::ServerConfig;
//! use openrouter_console::database::Database;
//! use openrouter_console::resources::ServerResources;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let database = Database::new(&config.database.url.to_connection_string()).await?;
//!     let resources = Arc::new(ServerResources::new(database, config).await?);
//!     openrouter_console::server::serve(resources).await
//! }
//! ```

#![deny(unsafe_code)]

/// Read-through caching for profiles and the model catalog
pub mod cache;

/// Environment-driven configuration
pub mod config;

/// System-wide constants and defaults
pub mod constants;

/// SQLite persistence layer
pub mod database;

/// Unified error handling
pub mod errors;

/// Upstream LLM transport (OpenRouter client and line framing)
pub mod llm;

/// Logging configuration
pub mod logging;

/// HTTP middleware (request-id, rate limiting, CORS)
pub mod middleware;

/// Shared domain enums
pub mod models;

/// Shared server resource container
pub mod resources;

/// HTTP route handlers
pub mod routes;

/// Router assembly and server lifecycle
pub mod server;

/// Stream orchestrator, delta parser, and resolution layer
pub mod streaming;
