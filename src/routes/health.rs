// ABOUTME: Health check route
// ABOUTME: Lightweight liveness endpoint with service version
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::constants::{rate_limits, service};
use crate::middleware::rate_limit::{enforce, RateLimitScope};
use crate::resources::ServerResources;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

/// Health check route handlers
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create health routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/health", get(Self::health))
            .route_layer(axum::middleware::from_fn_with_state(
                RateLimitScope {
                    limiter: resources.rate_limiter.clone(),
                    scope: "health",
                    preset: rate_limits::HEALTH,
                },
                enforce,
            ))
    }

    async fn health() -> impl IntoResponse {
        Json(json!({ "ok": true, "version": service::SERVER_VERSION }))
    }
}
