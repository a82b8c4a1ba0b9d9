// ABOUTME: Cache monitoring and clearing routes
// ABOUTME: Exposes hit rates and manual invalidation for the profile and model caches
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::cache::CacheProvider;
use crate::constants::rate_limits;
use crate::errors::AppError;
use crate::middleware::rate_limit::{enforce, RateLimitScope};
use crate::resources::ServerResources;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

/// Cache management route handlers
pub struct CacheRoutes;

impl CacheRoutes {
    /// Create all cache routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/cache/stats", get(Self::stats))
            .route("/api/cache/clear", post(Self::clear_all))
            .route("/api/cache/clear/profiles", post(Self::clear_profiles))
            .route("/api/cache/clear/models", post(Self::clear_models))
            .route_layer(axum::middleware::from_fn_with_state(
                RateLimitScope {
                    limiter: resources.rate_limiter.clone(),
                    scope: "cache",
                    preset: rate_limits::CRUD,
                },
                enforce,
            ))
            .with_state(resources)
    }

    /// Statistics for all cache instances
    async fn stats(State(resources): State<Arc<ServerResources>>) -> Response {
        let caches = vec![
            resources.profile_cache.stats().await,
            resources.model_cache.stats().await,
        ];
        Json(json!({ "caches": caches })).into_response()
    }

    /// Clear every cache
    async fn clear_all(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Response, AppError> {
        resources.profile_cache.clear_all().await?;
        resources.model_cache.clear_all().await?;
        Ok(Json(json!({
            "message": "All caches cleared successfully",
            "cleared": ["profiles", "models"],
        }))
        .into_response())
    }

    /// Clear only the profile cache
    async fn clear_profiles(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Response, AppError> {
        resources.profile_cache.clear_all().await?;
        Ok(Json(json!({ "message": "Profile cache cleared successfully" })).into_response())
    }

    /// Clear only the model cache
    async fn clear_models(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Response, AppError> {
        resources.model_cache.clear_all().await?;
        Ok(Json(json!({ "message": "Model cache cleared successfully" })).into_response())
    }
}
