// ABOUTME: Request tracing middleware for correlation and structured logging
// ABOUTME: Accepts or generates request IDs and exposes them as a request extension
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Span;
use uuid::Uuid;

/// Header carrying the request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request context that flows through the entire request lifecycle
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id, client-supplied or generated
    pub request_id: String,
}

impl RequestContext {
    /// Create new request context with a generated request ID
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: format!("req_{}", Uuid::new_v4().simple()),
        }
    }

    /// Record the id on the current tracing span
    pub fn record_in_span(&self) {
        Span::current().record("request_id", self.request_id.as_str());
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware that attaches a `RequestContext` to every request and echoes
/// the correlation id on the response
pub async fn with_request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map_or_else(
            || format!("req_{}", Uuid::new_v4().simple()),
            ToOwned::to_owned,
        );

    let context = RequestContext {
        request_id: request_id.clone(),
    };
    context.record_in_span();
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
