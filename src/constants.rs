// ABOUTME: System-wide constants and configuration defaults for the console backend
// ABOUTME: Contains resolution defaults, validation limits, cache TTLs, and rate limit presets
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Constants Module
//!
//! Application constants shared across modules. Values that are expected to
//! vary per deployment live in `config::environment` instead.

/// Service identity
pub mod service {
    /// Server name used in logs and headers
    pub const SERVER_NAME: &str = "openrouter-console";

    /// Server version from Cargo.toml
    pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Resolution-layer defaults applied when neither the request, the session,
/// nor a profile supplies a value
pub mod defaults {
    /// Default sampling temperature
    pub const TEMPERATURE: f64 = 0.7;

    /// Default max-token budget per completion
    pub const MAX_TOKENS: u32 = 2048;

    /// Default OpenRouter API base URL
    pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

    /// Default session listing page size
    pub const SESSION_LIST_LIMIT: i64 = 50;

    /// Default search page size
    pub const SEARCH_LIMIT: i64 = 20;
}

/// Validation bounds
pub mod limits {
    /// Inclusive temperature range accepted from requests and profiles
    pub const TEMPERATURE_MIN: f64 = 0.0;
    pub const TEMPERATURE_MAX: f64 = 2.0;

    /// Inclusive max-token range accepted from requests and profiles
    pub const MAX_TOKENS_MIN: u32 = 1;
    pub const MAX_TOKENS_MAX: u32 = 32_768;

    /// Profile name length bound
    pub const PROFILE_NAME_MAX: usize = 120;

    /// Maximum accepted document upload size in bytes (10 MB)
    pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

    /// Maximum sessions returned by a single list call
    pub const SESSION_LIST_MAX: i64 = 500;
}

/// Cache sizing and TTLs
pub mod cache {
    /// Maximum entries per in-memory cache
    pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1000;

    /// Background cleanup cadence in seconds
    pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

    /// Profiles change rarely but are read on every stream request
    pub const TTL_PROFILE_SECS: u64 = 60;

    /// Models change only on sync, so they tolerate a longer TTL
    pub const TTL_MODEL_SECS: u64 = 300;
}

/// Per-IP fixed-window rate limit presets
pub mod rate_limits {
    use std::time::Duration;

    /// (max requests, window) pair for a limiter scope
    #[derive(Debug, Clone, Copy)]
    pub struct Preset {
        pub max_requests: u32,
        pub window: Duration,
    }

    /// LLM streaming is the most expensive operation
    pub const STREAM: Preset = Preset {
        max_requests: 20,
        window: Duration::from_secs(60),
    };

    /// Model catalog sync hits the external provider
    pub const MODEL_SYNC: Preset = Preset {
        max_requests: 5,
        window: Duration::from_secs(3600),
    };

    /// Document uploads
    pub const UPLOAD: Preset = Preset {
        max_requests: 30,
        window: Duration::from_secs(60),
    };

    /// Standard CRUD operations
    pub const CRUD: Preset = Preset {
        max_requests: 60,
        window: Duration::from_secs(60),
    };

    /// Read-only listings are more lenient
    pub const READ: Preset = Preset {
        max_requests: 120,
        window: Duration::from_secs(60),
    };

    /// Health endpoint
    pub const HEALTH: Preset = Preset {
        max_requests: 300,
        window: Duration::from_secs(60),
    };
}
