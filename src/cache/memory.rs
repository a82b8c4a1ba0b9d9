// ABOUTME: In-memory cache implementation with LRU eviction and TTL support
// ABOUTME: Includes background cleanup task for expired entries and hit/miss counters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{CacheConfig, CacheKey, CacheProvider, CacheStats};
use crate::errors::{AppError, AppResult};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// In-memory cache entry with expiration
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory cache with LRU eviction and background cleanup
///
/// `Arc<RwLock<LruCache>>` gives shared state between cache operations and
/// the background cleanup task. `LruCache` provides O(1) eviction of the
/// least-recently-used entry when the capacity bound is hit.
#[derive(Clone)]
pub struct InMemoryCache {
    store: Arc<RwLock<LruCache<String, CacheEntry>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    config: Arc<CacheConfig>,
    shutdown_tx: Option<Arc<tokio::sync::mpsc::Sender<()>>>,
}

impl InMemoryCache {
    /// Fallback capacity when config specifies zero entries
    const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
        Some(n) => n,
        None => unreachable!(),
    };

    fn new_with_config(config: CacheConfig) -> Self {
        let capacity =
            NonZeroUsize::new(config.max_entries).unwrap_or(Self::DEFAULT_CACHE_CAPACITY);

        let store = Arc::new(RwLock::new(LruCache::new(capacity)));

        let shutdown_tx = if config.enable_background_cleanup {
            let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
            let store_clone = store.clone();
            let cleanup_interval = config.cleanup_interval;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(cleanup_interval);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            Self::cleanup_expired(&store_clone).await;
                        }
                        _ = shutdown_rx.recv() => {
                            tracing::debug!("Cache cleanup task received shutdown signal");
                            break;
                        }
                    }
                }
            });

            Some(Arc::new(shutdown_tx))
        } else {
            None
        };

        Self {
            store,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            config: Arc::new(config),
            shutdown_tx,
        }
    }

    /// Store with the cache's default TTL
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub async fn set_default<T: Serialize + Send + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
    ) -> AppResult<()> {
        self.set(key, value, self.config.default_ttl).await
    }

    /// Remove all expired entries from the cache
    async fn cleanup_expired(store: &Arc<RwLock<LruCache<String, CacheEntry>>>) {
        let mut store_guard = store.write().await;

        let expired_keys: Vec<String> = store_guard
            .iter()
            .filter_map(|(k, v)| v.is_expired().then(|| k.clone()))
            .collect();

        for key in &expired_keys {
            store_guard.pop(key);
        }

        let removed = expired_keys.len();
        drop(store_guard);
        if removed > 0 {
            tracing::debug!("Cleaned up {} expired cache entries", removed);
        }
    }
}

#[async_trait::async_trait]
impl CacheProvider for InMemoryCache {
    async fn new(config: CacheConfig) -> AppResult<Self> {
        Ok(Self::new_with_config(config))
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()> {
        let serialized = serde_json::to_vec(value)
            .map_err(|e| AppError::internal(format!("Cache serialization failed: {e}")))?;
        let entry = CacheEntry::new(serialized, ttl);

        // LruCache evicts automatically on push
        self.store.write().await.push(key.to_string(), entry);

        Ok(())
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        let mut store = self.store.write().await;

        // LruCache::get is mutable (updates access order)
        if let Some(entry) = store.get(&key.to_string()) {
            if entry.is_expired() {
                store.pop(&key.to_string());
                drop(store);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }

            let value: T = serde_json::from_slice(&entry.data)
                .map_err(|e| AppError::internal(format!("Cache deserialization failed: {e}")))?;
            drop(store);
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(value));
        }
        drop(store);

        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        self.store.write().await.pop(&key.to_string());
        Ok(())
    }

    async fn invalidate_pattern(&self, pattern: &str) -> AppResult<u64> {
        let mut store = self.store.write().await;

        let glob_pattern = glob::Pattern::new(pattern)
            .map_err(|e| AppError::internal(format!("Invalid glob pattern '{pattern}': {e}")))?;

        let keys_to_remove: Vec<String> = store
            .iter()
            .filter_map(|(k, _)| glob_pattern.matches(k).then(|| k.clone()))
            .collect();

        for key in &keys_to_remove {
            store.pop(key);
        }

        let removed = keys_to_remove.len() as u64;
        drop(store);
        Ok(removed)
    }

    async fn clear_all(&self) -> AppResult<()> {
        self.store.write().await.clear();
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        let size = self.store.read().await.len();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if total > 0 {
            format!("{:.1}%", hits as f64 / total as f64 * 100.0)
        } else {
            "0.0%".into()
        };

        CacheStats {
            name: self.config.name.clone(),
            hits,
            misses,
            size,
            hit_rate,
            ttl_secs: self.config.default_ttl.as_secs(),
        }
    }
}

impl Drop for InMemoryCache {
    fn drop(&mut self) {
        // Signal the cleanup task to exit once all clones are gone
        if let Some(tx) = &self.shutdown_tx {
            if let Err(e) = tx.try_send(()) {
                tracing::debug!(error = ?e, "Cache shutdown signal send failed (channel likely closed)");
            }
        }
    }
}
