// ABOUTME: Upstream LLM transport layer for the OpenRouter completions API
// ABOUTME: Defines chat message types and the raw line-stream contract consumed by the relay
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Upstream Transport
//!
//! This module owns the HTTP client for the external completion provider.
//! Its streaming contract is deliberately dumb: one chunked request in, a
//! lazy in-order sequence of raw text lines out. No JSON parsing, no SSE
//! prefix stripping, no `[DONE]` interpretation happens here; interpreting
//! line content is the delta parser's job (see `streaming::delta`).

mod lines;
mod openrouter;

pub use lines::{raw_line_stream, LineBuffer};
pub use openrouter::{OpenRouterClient, UpstreamModel};

use crate::errors::AppError;
use crate::models::MessageRole;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// A single message in an upstream chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a new chat message
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Lazy, single-pass, in-order sequence of raw lines from the upstream body.
///
/// Unbounded length and not restartable; the consumer drains it until
/// exhaustion or termination. Mid-stream transport failures surface as
/// `Err` items, not as special line values.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, AppError>> + Send>>;
