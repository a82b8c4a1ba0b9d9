// ABOUTME: HTTP middleware module organization
// ABOUTME: Request correlation, per-IP rate limiting, and CORS assembly
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// CORS layer construction from configuration
pub mod cors;
/// Per-IP fixed-window rate limiting
pub mod rate_limit;
/// Request-id correlation
pub mod request_id;

pub use rate_limit::RateLimiter;
pub use request_id::RequestContext;
