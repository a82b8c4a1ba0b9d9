// ABOUTME: Cache abstraction for read-through caching of profiles and catalog models
// ABOUTME: Explicit cache objects with typed keys and explicit invalidation on write paths
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// In-memory cache implementation
pub mod memory;

use crate::constants::cache::{
    DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CLEANUP_INTERVAL_SECS, TTL_MODEL_SECS, TTL_PROFILE_SECS,
};
use crate::errors::AppResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Cache provider trait
///
/// The Resolution Layer consumes caches only through this trait; every
/// write path (profile CRUD, model sync) calls the matching invalidation
/// explicitly. Nothing here is ambient or global.
#[async_trait::async_trait]
pub trait CacheProvider: Send + Sync + Clone {
    /// Create new cache instance with configuration
    ///
    /// # Errors
    ///
    /// Returns an error if cache initialization fails
    async fn new(config: CacheConfig) -> AppResult<Self>
    where
        Self: Sized;

    /// Store value in cache with TTL
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or storage fails
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()>;

    /// Retrieve value from cache
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails
    async fn get<T: for<'de> Deserialize<'de>>(&self, key: &CacheKey) -> AppResult<Option<T>>;

    /// Remove single cache entry
    ///
    /// # Errors
    ///
    /// Returns an error if invalidation fails
    async fn invalidate(&self, key: &CacheKey) -> AppResult<()>;

    /// Remove all cache entries matching a glob pattern (e.g. `model:*`)
    ///
    /// # Errors
    ///
    /// Returns an error if pattern invalidation fails
    async fn invalidate_pattern(&self, pattern: &str) -> AppResult<u64>;

    /// Clear all cache entries
    ///
    /// # Errors
    ///
    /// Returns an error if the clear operation fails
    async fn clear_all(&self) -> AppResult<()>;

    /// Hit/miss statistics for the monitoring endpoint
    async fn stats(&self) -> CacheStats;
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache name for stats and logging
    pub name: String,
    /// Maximum number of entries
    pub max_entries: usize,
    /// Default TTL applied by `ttl()` helpers
    pub default_ttl: Duration,
    /// Cleanup interval for expired entries
    pub cleanup_interval: Duration,
    /// Enable background cleanup task (false in tests to avoid runtime churn)
    pub enable_background_cleanup: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "cache".into(),
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            default_ttl: Duration::from_secs(TTL_PROFILE_SECS),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            enable_background_cleanup: true,
        }
    }
}

impl CacheConfig {
    /// Configuration for the profile cache
    #[must_use]
    pub fn profiles() -> Self {
        Self {
            name: "profiles".into(),
            default_ttl: Duration::from_secs(TTL_PROFILE_SECS),
            ..Self::default()
        }
    }

    /// Configuration for the model-catalog cache
    #[must_use]
    pub fn models() -> Self {
        Self {
            name: "models".into(),
            default_ttl: Duration::from_secs(TTL_MODEL_SECS),
            ..Self::default()
        }
    }
}

/// Typed cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Specific resource being cached
    pub resource: CacheResource,
}

impl CacheKey {
    /// Create new cache key
    #[must_use]
    pub const fn new(resource: CacheResource) -> Self {
        Self { resource }
    }

    /// Pattern matching every model-catalog entry
    #[must_use]
    pub fn model_pattern() -> String {
        "model:*".into()
    }

    /// Pattern matching every profile entry
    #[must_use]
    pub fn profile_pattern() -> String {
        "profile:*".into()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource)
    }
}

/// Cache resource types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheResource {
    /// Single profile by id
    Profile { profile_id: i64 },
    /// Full profile listing
    ProfileList,
    /// Catalog listing under a filter combination
    ModelList { filter_key: String },
    /// Single catalog model resolved by id
    Model { model_id: String },
}

impl fmt::Display for CacheResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile { profile_id } => write!(f, "profile:{profile_id}"),
            Self::ProfileList => write!(f, "profile:all"),
            Self::ModelList { filter_key } => write!(f, "model:list:{filter_key}"),
            Self::Model { model_id } => write!(f, "model:id:{model_id}"),
        }
    }
}

/// Statistics snapshot for one cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Cache name
    pub name: String,
    /// Lookup hits since startup
    pub hits: u64,
    /// Lookup misses since startup
    pub misses: u64,
    /// Current entry count
    pub size: usize,
    /// Hit rate as a percentage string
    pub hit_rate: String,
    /// Default TTL in seconds
    pub ttl_secs: u64,
}
