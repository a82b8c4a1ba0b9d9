// ABOUTME: Per-IP fixed-window rate limiting middleware with standard response headers
// ABOUTME: Window state lives in a concurrent map keyed by scope and client address
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Rate Limiting Middleware
//!
//! Fixed-window per-IP limiting with per-endpoint presets. Responses carry
//! the standard `X-RateLimit-*` headers, and exceeded limits produce the
//! structured 429 error body with a `Retry-After` hint.

use crate::constants::rate_limits::Preset;
use crate::errors::{AppError, ErrorCode};
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;

/// HTTP header names for rate limiting
pub mod headers {
    /// Maximum requests allowed in the current window
    pub const X_RATE_LIMIT_LIMIT: &str = "X-RateLimit-Limit";
    /// Remaining requests in the current window
    pub const X_RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";
    /// Window duration in seconds
    pub const X_RATE_LIMIT_WINDOW: &str = "X-RateLimit-Window";
    /// Seconds until the window resets
    pub const RETRY_AFTER: &str = "Retry-After";
}

#[derive(Debug)]
struct WindowState {
    window_start: Instant,
    count: u32,
}

/// Outcome of a limiter check
#[derive(Debug, Clone, Copy)]
pub struct RateLimitStatus {
    /// Window capacity
    pub limit: u32,
    /// Requests left in this window after the current one
    pub remaining: u32,
    /// Seconds until the window resets
    pub reset_secs: u64,
}

/// Shared fixed-window limiter state
#[derive(Clone, Default)]
pub struct RateLimiter {
    windows: Arc<DashMap<String, WindowState>>,
}

impl RateLimiter {
    /// Create an empty limiter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check and count one request for `client` under `scope`
    ///
    /// # Errors
    ///
    /// Returns a rate-limit error once the window capacity is exhausted
    pub fn check(
        &self,
        scope: &str,
        client: &str,
        preset: Preset,
    ) -> Result<RateLimitStatus, AppError> {
        let key = format!("{scope}:{client}");
        let now = Instant::now();

        let mut entry = self.windows.entry(key).or_insert_with(|| WindowState {
            window_start: now,
            count: 0,
        });

        if now.duration_since(entry.window_start) >= preset.window {
            entry.window_start = now;
            entry.count = 0;
        }

        let elapsed = now.duration_since(entry.window_start);
        let reset_secs = preset.window.saturating_sub(elapsed).as_secs().max(1);

        if entry.count >= preset.max_requests {
            return Err(AppError::new(
                ErrorCode::RateLimitExceeded,
                format!(
                    "Rate limit of {} requests per {} seconds exceeded",
                    preset.max_requests,
                    preset.window.as_secs()
                ),
            ));
        }

        entry.count += 1;
        Ok(RateLimitStatus {
            limit: preset.max_requests,
            remaining: preset.max_requests - entry.count,
            reset_secs,
        })
    }
}

/// Create a `HeaderMap` with rate limit headers
#[must_use]
pub fn create_rate_limit_headers(status: &RateLimitStatus, preset: Preset) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Ok(value) = HeaderValue::from_str(&status.limit.to_string()) {
        headers.insert(headers::X_RATE_LIMIT_LIMIT, value);
    }
    if let Ok(value) = HeaderValue::from_str(&status.remaining.to_string()) {
        headers.insert(headers::X_RATE_LIMIT_REMAINING, value);
    }
    if let Ok(value) = HeaderValue::from_str(&preset.window.as_secs().to_string()) {
        headers.insert(headers::X_RATE_LIMIT_WINDOW, value);
    }

    headers
}

/// Best-effort client address: proxy header first, then a local fallback
///
/// The console is a local-first single-user app, typically reached directly
/// or through one reverse proxy.
fn client_address(request: &Request) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| "local".to_owned(), ToOwned::to_owned)
}

/// State handed to the enforcement middleware for one scope
#[derive(Clone)]
pub struct RateLimitScope {
    /// Shared limiter windows
    pub limiter: RateLimiter,
    /// Scope name isolating this endpoint group's windows
    pub scope: &'static str,
    /// Capacity and window for this scope
    pub preset: Preset,
}

/// Middleware enforcing one scope's preset; register per route group with
/// `axum::middleware::from_fn_with_state`
pub async fn enforce(
    axum::extract::State(scope): axum::extract::State<RateLimitScope>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_address(&request);
    match scope.limiter.check(scope.scope, &client, scope.preset) {
        Ok(status) => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .extend(create_rate_limit_headers(&status, scope.preset));
            response
        }
        Err(error) => {
            let mut response = error.into_response();
            if let Ok(value) = HeaderValue::from_str(&scope.preset.window.as_secs().to_string()) {
                response.headers_mut().insert(headers::RETRY_AFTER, value);
            }
            response
        }
    }
}
