// ABOUTME: Unified error handling with typed error codes and HTTP response mapping
// ABOUTME: Defines AppError, ErrorCode taxonomy, and the structured JSON error body
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Unified Error Handling System
//!
//! Centralized error handling for the console backend. Defines standard
//! error codes, the `AppError` carrier type, and HTTP response formatting
//! so every module and endpoint reports failures the same way.
//!
//! The streaming endpoint never surfaces these as HTTP error statuses once
//! the SSE channel is open; the stream orchestrator converts them into
//! terminal `error` events instead (see `streaming`).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Validation (1000-1999)
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 1000,
    #[serde(rename = "VALUE_OUT_OF_RANGE")]
    ValueOutOfRange = 1001,

    // Rate Limiting (2000-2999)
    #[serde(rename = "RATE_LIMIT_EXCEEDED")]
    RateLimitExceeded = 2000,

    // Resource Management (4000-4999)
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound = 4000,
    #[serde(rename = "RESOURCE_ALREADY_EXISTS")]
    ResourceAlreadyExists = 4001,

    // Upstream provider (5000-5999)
    #[serde(rename = "UPSTREAM_ERROR")]
    UpstreamError = 5000,
    #[serde(rename = "UPSTREAM_UNAVAILABLE")]
    UpstreamUnavailable = 5001,

    // Configuration (6000-6999)
    #[serde(rename = "CONFIG_MISSING")]
    ConfigMissing = 6000,
    #[serde(rename = "CONFIG_INVALID")]
    ConfigInvalid = 6001,

    // Internal Errors (9000-9999)
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError = 9001,
    #[serde(rename = "STORAGE_ERROR")]
    StorageError = 9002,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::InvalidInput | Self::ValueOutOfRange | Self::ConfigMissing => 400,

            // 404 Not Found
            Self::ResourceNotFound => 404,

            // 409 Conflict
            Self::ResourceAlreadyExists => 409,

            // 429 Too Many Requests
            Self::RateLimitExceeded => 429,

            // 502 Bad Gateway
            Self::UpstreamError => 502,

            // 503 Service Unavailable
            Self::UpstreamUnavailable => 503,

            // 500 Internal Server Error
            Self::InternalError
            | Self::DatabaseError
            | Self::StorageError
            | Self::ConfigInvalid => 500,
        }
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidInput => "The provided input is invalid",
            Self::ValueOutOfRange => "The provided value is outside the acceptable range",
            Self::RateLimitExceeded => "Rate limit exceeded. Please slow down your requests",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::ResourceAlreadyExists => "A resource with this identifier already exists",
            Self::UpstreamError => "The upstream completion provider returned an error",
            Self::UpstreamUnavailable => "The upstream completion provider is unavailable",
            Self::ConfigMissing => "Required configuration is missing",
            Self::ConfigInvalid => "Configuration is invalid",
            Self::InternalError => "An internal server error occurred",
            Self::DatabaseError => "Database operation failed",
            Self::StorageError => "Storage operation failed",
        }
    }
}

/// Additional context attached to errors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Request ID for log correlation
    pub request_id: Option<String>,
    /// Resource ID if applicable
    pub resource_id: Option<String>,
    /// Upstream HTTP status for provider failures
    pub upstream_status: Option<u16>,
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional context
    pub context: ErrorContext,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add a request ID to the error context
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.context.request_id = Some(request_id.into());
        self
    }

    /// Add a resource ID to the error context
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.context.resource_id = Some(resource_id.into());
        self
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    ///
    /// Upstream failures report the provider's own status when one was
    /// captured, so callers see the real 429/503 rather than a generic 502.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.context
            .upstream_status
            .unwrap_or_else(|| self.code.http_status())
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Storage (filesystem) error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    /// Missing configuration
    pub fn config_missing(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigMissing, message)
    }

    /// Upstream provider failure carrying the provider's status code
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        let mut error = Self::new(ErrorCode::UpstreamError, message);
        error.context.upstream_status = Some(status);
        error
    }

    /// Upstream provider unreachable (connect/timeout, no status available)
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamUnavailable, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// HTTP error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorResponseDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: error.message,
                request_id: error.context.request_id,
                resource_id: error.context.resource_id,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(code = ?self.code, message = %self.message, "request failed");
        }
        (status, Json(ErrorResponse::from(self))).into_response()
    }
}

/// Conversion from anyhow::Error for the binary boundary
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(ErrorCode::InternalError, error.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        Self::database(error.to_string())
    }
}
