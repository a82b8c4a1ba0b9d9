// ABOUTME: Model catalog routes for listing and wholesale upstream sync
// ABOUTME: Sync upserts on the upstream id so local ids survive re-sync
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::cache::{CacheKey, CacheProvider, CacheResource};
use crate::constants::rate_limits;
use crate::database::{ModelFilters, ModelRecord, ModelUpsert};
use crate::errors::AppError;
use crate::middleware::rate_limit::{enforce, RateLimitScope};
use crate::resources::ServerResources;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Query parameters for catalog listing
#[derive(Debug, Default, Deserialize)]
pub struct ListModelsQuery {
    /// Only models with (or without) reasoning capability
    pub reasoning: Option<bool>,
    /// Upper bound on both per-million-token prices
    pub max_price: Option<f64>,
    /// Lower bound on context length
    pub min_context: Option<i64>,
}

/// Response for catalog listing
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelListResponse {
    pub models: Vec<ModelRecord>,
    pub total: usize,
}

/// Model catalog route handlers
pub struct ModelRoutes;

impl ModelRoutes {
    /// Create all model routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        let sync_limited = Router::new()
            .route("/api/models/sync", post(Self::sync_models))
            .route_layer(axum::middleware::from_fn_with_state(
                RateLimitScope {
                    limiter: resources.rate_limiter.clone(),
                    scope: "model_sync",
                    preset: rate_limits::MODEL_SYNC,
                },
                enforce,
            ));

        Router::new()
            .route("/api/models", get(Self::list_models))
            .route_layer(axum::middleware::from_fn_with_state(
                RateLimitScope {
                    limiter: resources.rate_limiter.clone(),
                    scope: "models_list",
                    preset: rate_limits::READ,
                },
                enforce,
            ))
            .merge(sync_limited)
            .with_state(resources)
    }

    /// List catalog models with optional filters
    async fn list_models(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<ListModelsQuery>,
    ) -> Result<Response, AppError> {
        if query.max_price.is_some_and(|p| p < 0.0) {
            return Err(AppError::invalid_input("max_price must be non-negative"));
        }
        if query.min_context.is_some_and(|c| c < 1) {
            return Err(AppError::invalid_input("min_context must be positive"));
        }

        let key = CacheKey::new(CacheResource::ModelList {
            filter_key: format!(
                "r{:?}_p{:?}_c{:?}",
                query.reasoning, query.max_price, query.min_context
            ),
        });

        let models: Vec<ModelRecord> = if let Some(cached) = resources.model_cache.get(&key).await?
        {
            cached
        } else {
            let models = resources
                .database
                .list_models(ModelFilters {
                    reasoning: query.reasoning,
                    max_price: query.max_price,
                    min_context: query.min_context,
                })
                .await?;
            resources.model_cache.set_default(&key, &models).await?;
            models
        };

        let total = models.len();
        Ok(Json(ModelListResponse { models, total }).into_response())
    }

    /// Mirror the upstream model listing into the local catalog
    async fn sync_models(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Response, AppError> {
        let upstream = resources.openrouter.list_models().await?;

        let rows: Vec<ModelUpsert> = upstream
            .into_iter()
            .map(|m| ModelUpsert {
                openrouter_id: m.openrouter_id,
                name: m.name,
                context_length: m.context_length,
                pricing_prompt: m.pricing_prompt,
                pricing_completion: m.pricing_completion,
                is_reasoning: m.is_reasoning,
            })
            .collect();

        let synced = resources.database.upsert_models(&rows).await?;
        resources.invalidate_models().await;

        info!(synced, "model catalog synchronized");
        Ok(Json(json!({ "synced": synced })).into_response())
    }
}
