// ABOUTME: Profile route handlers for named generation defaults
// ABOUTME: CRUD endpoints with read-through caching and explicit invalidation on writes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::cache::{CacheKey, CacheProvider, CacheResource};
use crate::constants::{limits, rate_limits};
use crate::database::{ProfileRecord, ProfileUpsert};
use crate::errors::AppError;
use crate::middleware::rate_limit::{enforce, RateLimitScope};
use crate::resources::ServerResources;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body for profile create and update
#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    /// Display name (1-120 characters)
    pub name: String,
    /// Optional system prompt
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Default temperature (0.0-2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Default max-token budget (1-32768)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,
    /// Optional OpenRouter routing preset
    #[serde(default)]
    pub openrouter_preset: Option<String>,
}

fn default_temperature() -> f64 {
    crate::constants::defaults::TEMPERATURE
}

const fn default_max_tokens() -> i64 {
    crate::constants::defaults::MAX_TOKENS as i64
}

impl ProfileRequest {
    fn validate(&self) -> Result<ProfileUpsert, AppError> {
        if self.name.is_empty() || self.name.len() > limits::PROFILE_NAME_MAX {
            return Err(AppError::invalid_input(format!(
                "name must be between 1 and {} characters",
                limits::PROFILE_NAME_MAX
            )));
        }
        if !(limits::TEMPERATURE_MIN..=limits::TEMPERATURE_MAX).contains(&self.temperature) {
            return Err(AppError::invalid_input(format!(
                "temperature must be between {} and {}",
                limits::TEMPERATURE_MIN,
                limits::TEMPERATURE_MAX
            )));
        }
        if self.max_tokens < i64::from(limits::MAX_TOKENS_MIN)
            || self.max_tokens > i64::from(limits::MAX_TOKENS_MAX)
        {
            return Err(AppError::invalid_input(format!(
                "max_tokens must be between {} and {}",
                limits::MAX_TOKENS_MIN,
                limits::MAX_TOKENS_MAX
            )));
        }

        Ok(ProfileUpsert {
            name: self.name.clone(),
            system_prompt: self.system_prompt.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            openrouter_preset: self.openrouter_preset.clone(),
        })
    }
}

/// Response for profile listing
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileListResponse {
    pub profiles: Vec<ProfileRecord>,
    pub total: usize,
}

/// Profile route handlers
pub struct ProfileRoutes;

impl ProfileRoutes {
    /// Create all profile routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/profiles",
                get(Self::list_profiles).post(Self::create_profile),
            )
            .route(
                "/api/profiles/:profile_id",
                get(Self::get_profile)
                    .put(Self::update_profile)
                    .delete(Self::delete_profile),
            )
            .route_layer(axum::middleware::from_fn_with_state(
                RateLimitScope {
                    limiter: resources.rate_limiter.clone(),
                    scope: "profiles",
                    preset: rate_limits::CRUD,
                },
                enforce,
            ))
            .with_state(resources)
    }

    /// Create a new profile
    async fn create_profile(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<ProfileRequest>,
    ) -> Result<Response, AppError> {
        let upsert = request.validate()?;
        let profile = resources.database.create_profile(&upsert).await?;
        resources.invalidate_profile(profile.id).await;

        Ok((StatusCode::CREATED, Json(profile)).into_response())
    }

    /// List profiles through the read-through cache
    async fn list_profiles(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Response, AppError> {
        let key = CacheKey::new(CacheResource::ProfileList);

        let profiles: Vec<ProfileRecord> =
            if let Some(cached) = resources.profile_cache.get(&key).await? {
                cached
            } else {
                let profiles = resources.database.list_profiles().await?;
                resources.profile_cache.set_default(&key, &profiles).await?;
                profiles
            };

        let total = profiles.len();
        Ok(Json(ProfileListResponse { profiles, total }).into_response())
    }

    /// Get one profile
    async fn get_profile(
        State(resources): State<Arc<ServerResources>>,
        Path(profile_id): Path<i64>,
    ) -> Result<Response, AppError> {
        let profile = resources.cached_profile(profile_id).await?.ok_or_else(|| {
            AppError::not_found("Profile").with_resource_id(profile_id.to_string())
        })?;

        Ok(Json(profile).into_response())
    }

    /// Replace a profile's fields
    async fn update_profile(
        State(resources): State<Arc<ServerResources>>,
        Path(profile_id): Path<i64>,
        Json(request): Json<ProfileRequest>,
    ) -> Result<Response, AppError> {
        let upsert = request.validate()?;
        let updated = resources
            .database
            .update_profile(profile_id, &upsert)
            .await?;
        if !updated {
            return Err(
                AppError::not_found("Profile").with_resource_id(profile_id.to_string())
            );
        }

        resources.invalidate_profile(profile_id).await;

        let profile = resources
            .database
            .get_profile(profile_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found("Profile").with_resource_id(profile_id.to_string())
            })?;
        Ok(Json(profile).into_response())
    }

    /// Delete a profile
    async fn delete_profile(
        State(resources): State<Arc<ServerResources>>,
        Path(profile_id): Path<i64>,
    ) -> Result<Response, AppError> {
        let deleted = resources.database.delete_profile(profile_id).await?;
        if !deleted {
            return Err(
                AppError::not_found("Profile").with_resource_id(profile_id.to_string())
            );
        }

        resources.invalidate_profile(profile_id).await;
        Ok((StatusCode::NO_CONTENT, ()).into_response())
    }
}
