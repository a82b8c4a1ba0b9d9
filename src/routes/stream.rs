// ABOUTME: SSE streaming endpoint relaying chat completions into an open session
// ABOUTME: Resolution failures surface as SSE error events, never as broken connections
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::constants::rate_limits;
use crate::middleware::rate_limit::{enforce, RateLimitScope};
use crate::middleware::RequestContext;
use crate::resources::ServerResources;
use crate::streaming::resolve::{resolve_stream, StreamParams};
use crate::streaming::{error_only_stream, relay_stream, RelayContext};
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Extension, Router};
use futures_util::Stream;
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::info;

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

/// Streaming route handlers
pub struct StreamRoutes;

impl StreamRoutes {
    /// Create the streaming route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/stream", get(Self::stream))
            .route_layer(axum::middleware::from_fn_with_state(
                RateLimitScope {
                    limiter: resources.rate_limiter.clone(),
                    scope: "stream",
                    preset: rate_limits::STREAM,
                },
                enforce,
            ))
            .with_state(resources)
    }

    /// Open an SSE relay for one chat completion
    ///
    /// The response is always a well-formed `text/event-stream`;
    /// EventSource clients cannot observe non-2xx statuses, so resolution
    /// failures are delivered in-band as a single `error` event.
    async fn stream(
        State(resources): State<Arc<ServerResources>>,
        Extension(request_context): Extension<RequestContext>,
        Query(params): Query<StreamParams>,
    ) -> Sse<EventStream> {
        let request_id = request_context.request_id;

        let resolved = match resolve_stream(&resources, params).await {
            Ok(resolved) => resolved,
            Err(e) => {
                let events: EventStream = Box::pin(
                    error_only_stream(&e, &request_id)
                        .map(|event| Ok::<_, Infallible>(event.into_sse())),
                );
                return Sse::new(events).keep_alive(KeepAlive::default());
            }
        };

        info!(
            session_id = %resolved.session_id,
            model = %resolved.upstream_model,
            request_id = %request_id,
            "starting stream relay"
        );

        let mut extra = Map::new();
        extra.insert(
            "session_id".to_owned(),
            Value::String(resolved.session_id.clone()),
        );

        let context = RelayContext {
            session_id: resolved.session_id.clone(),
            catalog_model_id: resolved.catalog_model_id.clone(),
            profile_id: resolved.profile_id,
            request_id,
            extra,
        };

        let openrouter = resources.openrouter.clone();
        let model = resolved.upstream_model;
        let messages = resolved.messages;
        let temperature = resolved.temperature;
        let max_tokens = resolved.max_tokens;
        let open = async move {
            openrouter
                .stream_chat_completions(&model, &messages, temperature, max_tokens)
                .await
        };

        let events: EventStream = Box::pin(
            relay_stream(resources.database.clone(), context, open)
                .map(|event| Ok::<_, Infallible>(event.into_sse())),
        );
        Sse::new(events).keep_alive(KeepAlive::default())
    }
}
