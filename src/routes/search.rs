// ABOUTME: Full-text search route over message content
// ABOUTME: Thin wrapper around the FTS5-backed database search
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::constants::{defaults, rate_limits};
use crate::database::{SearchFilters, SearchHit};
use crate::errors::AppError;
use crate::middleware::rate_limit::{enforce, RateLimitScope};
use crate::resources::ServerResources;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Query parameters for message search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// FTS5 query string (keywords, quoted phrases, `term*`, `NOT term`)
    pub q: String,
    /// Restrict to one session type
    #[serde(default)]
    pub session_type: Option<String>,
    /// Inclusive lower bound on message creation time
    #[serde(default)]
    pub date_from: Option<String>,
    /// Inclusive upper bound on message creation time
    #[serde(default)]
    pub date_to: Option<String>,
    /// Page size
    #[serde(default = "default_search_limit")]
    pub limit: i64,
    /// Page offset
    #[serde(default)]
    pub offset: i64,
}

const fn default_search_limit() -> i64 {
    defaults::SEARCH_LIMIT
}

/// Response for a search request
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub total: usize,
}

/// Search route handlers
pub struct SearchRoutes;

impl SearchRoutes {
    /// Create the search route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/search", get(Self::search))
            .route_layer(axum::middleware::from_fn_with_state(
                RateLimitScope {
                    limiter: resources.rate_limiter.clone(),
                    scope: "search",
                    preset: rate_limits::READ,
                },
                enforce,
            ))
            .with_state(resources)
    }

    /// Search message content
    async fn search(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<SearchQuery>,
    ) -> Result<Response, AppError> {
        if query.q.trim().is_empty() {
            return Err(AppError::invalid_input("q must not be empty"));
        }
        if query.limit < 1 || query.limit > 100 {
            return Err(AppError::invalid_input("limit must be between 1 and 100"));
        }
        if query.offset < 0 {
            return Err(AppError::invalid_input("offset must be non-negative"));
        }

        let results = resources
            .database
            .search_messages(
                &query.q,
                &SearchFilters {
                    session_type: query.session_type,
                    date_from: query.date_from,
                    date_to: query.date_to,
                    limit: query.limit,
                    offset: query.offset,
                },
            )
            .await?;

        let total = results.len();
        Ok(Json(SearchResponse { results, total }).into_response())
    }
}
