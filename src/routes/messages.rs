// ABOUTME: Message append route
// ABOUTME: Messages are immutable once written; only creation is exposed
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::constants::rate_limits;
use crate::errors::AppError;
use crate::middleware::rate_limit::{enforce, RateLimitScope};
use crate::models::MessageRole;
use crate::resources::ServerResources;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;

/// Request to append a message
#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    /// Owning session
    pub session_id: String,
    /// Message role
    pub role: MessageRole,
    /// Message content (non-empty)
    pub content: String,
}

/// Message route handlers
pub struct MessageRoutes;

impl MessageRoutes {
    /// Create message routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/messages", post(Self::create_message))
            .route_layer(axum::middleware::from_fn_with_state(
                RateLimitScope {
                    limiter: resources.rate_limiter.clone(),
                    scope: "messages",
                    preset: rate_limits::READ,
                },
                enforce,
            ))
            .with_state(resources)
    }

    /// Append a message to a session
    async fn create_message(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<CreateMessageRequest>,
    ) -> Result<Response, AppError> {
        if request.content.is_empty() {
            return Err(AppError::invalid_input("content must not be empty"));
        }

        resources
            .database
            .get_session(&request.session_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found("Session").with_resource_id(request.session_id.clone())
            })?;

        let message = resources
            .database
            .add_message(&request.session_id, request.role, &request.content)
            .await?;

        Ok((StatusCode::CREATED, Json(message)).into_response())
    }
}
