// ABOUTME: Usage accounting routes over the append-only usage ledger
// ABOUTME: Manual inserts plus per-session listing and per-model aggregation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::constants::rate_limits;
use crate::database::{ModelUsageSummary, UsageLogRecord};
use crate::errors::AppError;
use crate::middleware::rate_limit::{enforce, RateLimitScope};
use crate::resources::ServerResources;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request to record usage manually
#[derive(Debug, Deserialize)]
pub struct CreateUsageRequest {
    /// Owning session
    pub session_id: String,
    /// Catalog model id, if known
    #[serde(default)]
    pub model_id: Option<String>,
    /// Profile in effect, if any
    #[serde(default)]
    pub profile_id: Option<i64>,
    /// Prompt token count
    #[serde(default)]
    pub prompt_tokens: i64,
    /// Completion token count
    #[serde(default)]
    pub completion_tokens: i64,
}

/// Response for per-session usage listing
#[derive(Debug, Serialize, Deserialize)]
pub struct UsageListResponse {
    pub usage: Vec<UsageLogRecord>,
    pub total: usize,
}

/// Response for the per-model aggregate
#[derive(Debug, Serialize, Deserialize)]
pub struct UsageSummaryResponse {
    pub models: Vec<ModelUsageSummary>,
}

/// Usage route handlers
pub struct UsageRoutes;

impl UsageRoutes {
    /// Create all usage routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/usage", post(Self::create_usage))
            .route("/api/usage/sessions/:session_id", get(Self::usage_by_session))
            .route("/api/usage/models", get(Self::usage_by_model))
            .route_layer(axum::middleware::from_fn_with_state(
                RateLimitScope {
                    limiter: resources.rate_limiter.clone(),
                    scope: "usage",
                    preset: rate_limits::READ,
                },
                enforce,
            ))
            .with_state(resources)
    }

    /// Record one usage entry
    async fn create_usage(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<CreateUsageRequest>,
    ) -> Result<Response, AppError> {
        if request.prompt_tokens < 0 || request.completion_tokens < 0 {
            return Err(AppError::invalid_input("token counts must be non-negative"));
        }

        resources
            .database
            .get_session(&request.session_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found("Session").with_resource_id(request.session_id.clone())
            })?;

        // A caller may hand us either a local catalog id or an upstream id
        let model_id = match request.model_id.as_deref() {
            Some(id) => resources.database.find_model(id).await?.map(|m| m.id),
            None => None,
        };

        let usage_id = resources
            .database
            .insert_usage_log(
                &request.session_id,
                model_id.as_deref(),
                request.profile_id,
                request.prompt_tokens,
                request.completion_tokens,
            )
            .await?;

        let record = resources
            .database
            .get_usage_log(&usage_id)
            .await?
            .ok_or_else(|| AppError::internal("Usage log not found after creation"))?;

        Ok((StatusCode::CREATED, Json(record)).into_response())
    }

    /// Usage entries for one session, newest first
    async fn usage_by_session(
        State(resources): State<Arc<ServerResources>>,
        Path(session_id): Path<String>,
    ) -> Result<Response, AppError> {
        let usage = resources.database.list_usage_by_session(&session_id).await?;
        let total = usage.len();
        Ok(Json(UsageListResponse { usage, total }).into_response())
    }

    /// Aggregate usage per model
    async fn usage_by_model(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Response, AppError> {
        let models = resources.database.aggregate_usage_by_model().await?;
        Ok(Json(UsageSummaryResponse { models }).into_response())
    }
}
