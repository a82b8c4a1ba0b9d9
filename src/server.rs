// ABOUTME: Application router assembly and HTTP server lifecycle
// ABOUTME: Merges domain routers and applies CORS, tracing, and request-id middleware
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::middleware::cors::cors_layer;
use crate::middleware::request_id::with_request_id;
use crate::resources::ServerResources;
use crate::routes::{
    AdminRoutes, CacheRoutes, DocumentRoutes, HealthRoutes, LogRoutes, MessageRoutes, ModelRoutes,
    ProfileRoutes, SearchRoutes, SessionRoutes, StreamRoutes, UsageRoutes,
};
use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the complete application router
#[must_use]
pub fn create_router(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .merge(HealthRoutes::routes(resources.clone()))
        .merge(ModelRoutes::routes(resources.clone()))
        .merge(ProfileRoutes::routes(resources.clone()))
        .merge(SessionRoutes::routes(resources.clone()))
        .merge(MessageRoutes::routes(resources.clone()))
        .merge(StreamRoutes::routes(resources.clone()))
        .merge(UsageRoutes::routes(resources.clone()))
        .merge(SearchRoutes::routes(resources.clone()))
        .merge(DocumentRoutes::routes(resources.clone()))
        .merge(AdminRoutes::routes(resources.clone()))
        .merge(CacheRoutes::routes(resources.clone()))
        .merge(LogRoutes::routes(resources.clone()))
        .layer(axum::middleware::from_fn(with_request_id))
        .layer(cors_layer(&resources.config.cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until shutdown
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails
pub async fn serve(resources: Arc<ServerResources>) -> Result<()> {
    let port = resources.config.http_port;
    let router = create_router(resources);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolve when the process receives SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut signal) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            signal.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}
