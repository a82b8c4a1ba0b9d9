// ABOUTME: Session route handlers for console conversation management
// ABOUTME: CRUD endpoints plus per-session message listing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::constants::{defaults, limits, rate_limits};
use crate::database::{MessageRecord, SessionRecord, SessionUpdate};
use crate::errors::AppError;
use crate::middleware::rate_limit::{enforce, RateLimitScope};
use crate::models::SessionType;
use crate::resources::ServerResources;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request to create a session
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Session kind; defaults to chat
    #[serde(default)]
    pub session_type: SessionType,
    /// Optional title
    #[serde(default)]
    pub title: Option<String>,
    /// Optional default profile
    #[serde(default)]
    pub profile_id: Option<i64>,
}

/// Query parameters for listing sessions
#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    /// Maximum number of sessions to return
    #[serde(default = "default_limit")]
    pub limit: i64,
}

const fn default_limit() -> i64 {
    defaults::SESSION_LIST_LIMIT
}

/// Response for session listing
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionRecord>,
    pub total: usize,
}

/// Response for a session's message history
#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesListResponse {
    pub messages: Vec<MessageRecord>,
}

/// Session route handlers
pub struct SessionRoutes;

impl SessionRoutes {
    /// Create all session routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/sessions",
                get(Self::list_sessions).post(Self::create_session),
            )
            .route(
                "/api/sessions/:session_id",
                get(Self::get_session)
                    .patch(Self::update_session)
                    .delete(Self::delete_session),
            )
            .route(
                "/api/sessions/:session_id/messages",
                get(Self::session_messages),
            )
            .route_layer(axum::middleware::from_fn_with_state(
                RateLimitScope {
                    limiter: resources.rate_limiter.clone(),
                    scope: "sessions",
                    preset: rate_limits::CRUD,
                },
                enforce,
            ))
            .with_state(resources)
    }

    /// Create a new session
    async fn create_session(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<CreateSessionRequest>,
    ) -> Result<Response, AppError> {
        if let Some(profile_id) = request.profile_id {
            resources
                .cached_profile(profile_id)
                .await?
                .ok_or_else(|| {
                    AppError::not_found("Profile").with_resource_id(profile_id.to_string())
                })?;
        }

        let session = resources
            .database
            .create_session(
                request.session_type,
                request.title.as_deref(),
                request.profile_id,
            )
            .await?;

        Ok((StatusCode::CREATED, Json(session)).into_response())
    }

    /// List sessions, newest first
    async fn list_sessions(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<ListSessionsQuery>,
    ) -> Result<Response, AppError> {
        if query.limit < 1 || query.limit > limits::SESSION_LIST_MAX {
            return Err(AppError::invalid_input(format!(
                "limit must be between 1 and {}",
                limits::SESSION_LIST_MAX
            )));
        }

        let sessions = resources.database.list_sessions(query.limit).await?;
        let total = sessions.len();
        Ok(Json(SessionListResponse { sessions, total }).into_response())
    }

    /// Get one session
    async fn get_session(
        State(resources): State<Arc<ServerResources>>,
        Path(session_id): Path<String>,
    ) -> Result<Response, AppError> {
        let session = resources
            .database
            .get_session(&session_id)
            .await?
            .ok_or_else(|| AppError::not_found("Session").with_resource_id(session_id))?;

        Ok(Json(session).into_response())
    }

    /// Update a session's title or default profile
    async fn update_session(
        State(resources): State<Arc<ServerResources>>,
        Path(session_id): Path<String>,
        Json(update): Json<SessionUpdate>,
    ) -> Result<Response, AppError> {
        if let Some(Some(profile_id)) = update.profile_id {
            resources
                .cached_profile(profile_id)
                .await?
                .ok_or_else(|| {
                    AppError::not_found("Profile").with_resource_id(profile_id.to_string())
                })?;
        }

        let updated = resources
            .database
            .update_session(&session_id, &update)
            .await?;
        if !updated {
            return Err(AppError::not_found("Session").with_resource_id(session_id.clone()));
        }

        let session = resources
            .database
            .get_session(&session_id)
            .await?
            .ok_or_else(|| AppError::not_found("Session").with_resource_id(session_id))?;
        Ok(Json(session).into_response())
    }

    /// Delete a session and everything it owns
    async fn delete_session(
        State(resources): State<Arc<ServerResources>>,
        Path(session_id): Path<String>,
    ) -> Result<Response, AppError> {
        let deleted = resources.database.delete_session(&session_id).await?;
        if !deleted {
            return Err(AppError::not_found("Session").with_resource_id(session_id));
        }

        Ok((StatusCode::NO_CONTENT, ()).into_response())
    }

    /// List a session's messages in order
    async fn session_messages(
        State(resources): State<Arc<ServerResources>>,
        Path(session_id): Path<String>,
    ) -> Result<Response, AppError> {
        resources
            .database
            .get_session(&session_id)
            .await?
            .ok_or_else(|| AppError::not_found("Session").with_resource_id(session_id.clone()))?;

        let messages = resources.database.list_messages(&session_id).await?;
        Ok(Json(MessagesListResponse { messages }).into_response())
    }
}
