// ABOUTME: Centralized resource container for dependency injection across route handlers
// ABOUTME: Owns the database, upstream client, configuration, and read-through caches
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Server Resources
//!
//! Shared resources are created once at startup and handed to every router
//! behind an `Arc`. The profile and model caches live here as explicit
//! objects; every write path calls the matching invalidation helper, so no
//! module ever reasons about cache staleness on its own.

use crate::cache::memory::InMemoryCache;
use crate::cache::{CacheConfig, CacheKey, CacheProvider, CacheResource};
use crate::config::environment::ServerConfig;
use crate::database::{Database, ProfileRecord};
use crate::errors::AppResult;
use crate::llm::OpenRouterClient;
use crate::middleware::RateLimiter;
use std::sync::Arc;

/// Centralized resource container for dependency injection
#[derive(Clone)]
pub struct ServerResources {
    /// SQLite-backed storage
    pub database: Database,
    /// Environment-derived configuration
    pub config: Arc<ServerConfig>,
    /// Upstream completion provider client
    pub openrouter: OpenRouterClient,
    /// Read-through cache for profiles
    pub profile_cache: InMemoryCache,
    /// Read-through cache for the model catalog
    pub model_cache: InMemoryCache,
    /// Shared per-IP rate limiter windows
    pub rate_limiter: RateLimiter,
}

impl ServerResources {
    /// Create server resources with default cache configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream client or caches cannot be created
    pub async fn new(database: Database, config: ServerConfig) -> AppResult<Self> {
        let openrouter = OpenRouterClient::new(config.openrouter.clone())?;
        let profile_cache = InMemoryCache::new(CacheConfig::profiles()).await?;
        let model_cache = InMemoryCache::new(CacheConfig::models()).await?;

        Ok(Self {
            database,
            config: Arc::new(config),
            openrouter,
            profile_cache,
            model_cache,
            rate_limiter: RateLimiter::new(),
        })
    }

    /// Profile lookup through the read-through cache
    ///
    /// # Errors
    ///
    /// Returns an error if the database lookup fails
    pub async fn cached_profile(&self, profile_id: i64) -> AppResult<Option<ProfileRecord>> {
        let key = CacheKey::new(CacheResource::Profile { profile_id });

        if let Some(profile) = self.profile_cache.get(&key).await? {
            return Ok(Some(profile));
        }

        let profile = self.database.get_profile(profile_id).await?;
        if let Some(ref record) = profile {
            self.profile_cache.set_default(&key, record).await?;
        }
        Ok(profile)
    }

    /// Invalidate cached state for one profile and the profile listing
    ///
    /// Called on every profile create, update, and delete.
    pub async fn invalidate_profile(&self, profile_id: i64) {
        let _ = self
            .profile_cache
            .invalidate(&CacheKey::new(CacheResource::Profile { profile_id }))
            .await;
        let _ = self
            .profile_cache
            .invalidate(&CacheKey::new(CacheResource::ProfileList))
            .await;
    }

    /// Invalidate every cached model entry
    ///
    /// Called after catalog sync.
    pub async fn invalidate_models(&self) {
        let _ = self
            .model_cache
            .invalidate_pattern(&CacheKey::model_pattern())
            .await;
    }
}
