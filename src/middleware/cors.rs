// ABOUTME: CORS layer construction from the configured origin allowlist
// ABOUTME: Credentials are allowed, so origins are always listed explicitly
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use axum::http::HeaderValue;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tracing::warn;

/// Build the CORS layer from the configured origin list
///
/// Origins that fail header-value parsing are skipped with a warning
/// rather than aborting startup.
#[must_use]
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "skipping unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
