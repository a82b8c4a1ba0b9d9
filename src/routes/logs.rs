// ABOUTME: Frontend log sink route
// ABOUTME: Re-emits structured frontend log batches through the server's tracing subscriber
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::constants::rate_limits;
use crate::middleware::rate_limit::{enforce, RateLimitScope};
use crate::middleware::RequestContext;
use crate::resources::ServerResources;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One frontend log entry
#[derive(Debug, Deserialize)]
pub struct LogEntry {
    /// Log level: debug, info, warn, error, critical
    pub level: String,
    /// Log message
    pub message: String,
    /// Additional metadata
    #[serde(default)]
    pub meta: Value,
    /// Context (session, route, etc.)
    #[serde(default)]
    pub context: Value,
}

/// Batch of frontend logs
#[derive(Debug, Deserialize)]
pub struct FrontendLogsRequest {
    pub logs: Vec<LogEntry>,
}

/// Frontend log sink route handlers
pub struct LogRoutes;

impl LogRoutes {
    /// Create the log sink route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/logs", post(Self::receive_frontend_logs))
            .route_layer(axum::middleware::from_fn_with_state(
                RateLimitScope {
                    limiter: resources.rate_limiter.clone(),
                    scope: "logs",
                    preset: rate_limits::CRUD,
                },
                enforce,
            ))
            .with_state(resources)
    }

    /// Receive a batch of frontend logs and re-emit them server-side
    async fn receive_frontend_logs(
        Extension(request_context): Extension<RequestContext>,
        Json(request): Json<FrontendLogsRequest>,
    ) -> Response {
        let received = request.logs.len();

        for entry in request.logs {
            let session = entry.context.get("sessionId").cloned().unwrap_or(Value::Null);
            let route = entry.context.get("route").cloned().unwrap_or(Value::Null);

            match entry.level.to_lowercase().as_str() {
                "debug" => debug!(
                    request_id = %request_context.request_id,
                    frontend_session = %session,
                    frontend_route = %route,
                    frontend_meta = %entry.meta,
                    "[frontend] {}",
                    entry.message
                ),
                "warn" => warn!(
                    request_id = %request_context.request_id,
                    frontend_session = %session,
                    frontend_route = %route,
                    frontend_meta = %entry.meta,
                    "[frontend] {}",
                    entry.message
                ),
                "error" | "critical" => error!(
                    request_id = %request_context.request_id,
                    frontend_session = %session,
                    frontend_route = %route,
                    frontend_meta = %entry.meta,
                    "[frontend] {}",
                    entry.message
                ),
                _ => info!(
                    request_id = %request_context.request_id,
                    frontend_session = %session,
                    frontend_route = %route,
                    frontend_meta = %entry.meta,
                    "[frontend] {}",
                    entry.message
                ),
            }
        }

        Json(json!({
            "success": true,
            "received": received,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
        .into_response()
    }
}
