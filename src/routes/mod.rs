// ABOUTME: Route module organization for the console HTTP endpoints
// ABOUTME: One domain per module with thin handlers delegating to the storage and relay layers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Route modules for the console backend
//!
//! Each domain module contains route definitions and thin handler
//! functions that delegate to the database, cache, and streaming layers.

/// Backup and restore admin routes
pub mod admin;
/// Cache monitoring and clearing routes
pub mod cache;
/// Document upload and Q&A routes
pub mod documents;
/// Health check routes
pub mod health;
/// Frontend log sink routes
pub mod logs;
/// Message append routes
pub mod messages;
/// Model catalog routes
pub mod models;
/// Profile CRUD routes
pub mod profiles;
/// Full-text search routes
pub mod search;
/// Session CRUD routes
pub mod sessions;
/// SSE streaming routes
pub mod stream;
/// Usage accounting routes
pub mod usage;

pub use admin::AdminRoutes;
pub use cache::CacheRoutes;
pub use documents::DocumentRoutes;
pub use health::HealthRoutes;
pub use logs::LogRoutes;
pub use messages::MessageRoutes;
pub use models::ModelRoutes;
pub use profiles::ProfileRoutes;
pub use search::SearchRoutes;
pub use sessions::SessionRoutes;
pub use stream::StreamRoutes;
pub use usage::UsageRoutes;
